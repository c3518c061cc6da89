use crate::error;
use core::str::FromStr;
use quick_xml::escape::unescape;
use quick_xml::se::Serializer;
use quick_xml::DeError;
use serde_derive::Serialize;

/// One operation inside an `<rpc>` envelope.
///
/// A session never inspects a method; it only embeds the XML returned by
/// [`to_xml`](RpcMethod::to_xml) verbatim.
pub trait RpcMethod: Send + Sync {
    fn to_xml(&self) -> Result<String, DeError>;
}

/// Caller supplied operation XML, sent as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMethod(String);

impl RawMethod {
    pub fn new(xml: impl Into<String>) -> RawMethod {
        RawMethod(xml.into().trim().to_string())
    }
}

impl RpcMethod for RawMethod {
    fn to_xml(&self) -> Result<String, DeError> {
        Ok(self.0.clone())
    }
}

/// `<close-session>`, [RFC6241 7.8](https://www.rfc-editor.org/rfc/rfc6241.html#section-7.8).
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseSession;

impl RpcMethod for CloseSession {
    fn to_xml(&self) -> Result<String, DeError> {
        Ok("<close-session/>".to_string())
    }
}

/// `<kill-session>`, [RFC6241 7.9](https://www.rfc-editor.org/rfc/rfc6241.html#section-7.9).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KillSession {
    #[serde(rename = "session-id")]
    session_id: u64,
}

impl KillSession {
    pub fn new(session_id: u64) -> KillSession {
        KillSession { session_id }
    }
}

impl RpcMethod for KillSession {
    fn to_xml(&self) -> Result<String, DeError> {
        serialize_with_root(self, "kill-session")
    }
}

/// GetConfig implements the `<get-config>` rpc operation defined in [RFC6241 7.1].
/// `source` is the datastore to query.
///
/// [RFC6241 7.1]: https://www.rfc-editor.org/rfc/rfc6241.html#section-7.1
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GetConfig {
    source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    with_defaults: Option<WithDefaults>,
}

impl GetConfig {
    pub fn new(
        datastore: Datastore,
        filter: Option<Filter>,
        defaults: Option<WithDefaultsValue>,
    ) -> GetConfig {
        GetConfig {
            source: Source { datastore },
            filter,
            with_defaults: defaults.map(WithDefaults::new),
        }
    }
}

impl RpcMethod for GetConfig {
    fn to_xml(&self) -> Result<String, DeError> {
        let xml = serialize_with_root(self, "get-config")?;
        unescape_filter(xml, self.filter.is_some())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Get {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    with_defaults: Option<WithDefaults>,
}

impl Get {
    pub fn new(filter: Option<Filter>, defaults: Option<WithDefaultsValue>) -> Get {
        Get {
            filter,
            with_defaults: defaults.map(WithDefaults::new),
        }
    }
}

impl RpcMethod for Get {
    fn to_xml(&self) -> Result<String, DeError> {
        let xml = serialize_with_root(self, "get")?;
        unescape_filter(xml, self.filter.is_some())
    }
}

fn serialize_with_root<T: serde::Serialize>(value: &T, root: &str) -> Result<String, DeError> {
    let mut buffer = String::with_capacity(256);
    let ser = Serializer::with_root(&mut buffer, Some(root))?;
    value.serialize(ser)?;
    Ok(buffer)
}

// Subtree filters are serialized as escaped text and have to be turned back into markup.
fn unescape_filter(xml: String, has_filter: bool) -> Result<String, DeError> {
    if !has_filter {
        return Ok(xml);
    }
    unescape(&xml)
        .map(|xml| xml.into_owned())
        .map_err(|err| DeError::Custom(err.to_string()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct WithDefaults {
    #[serde(rename = "@xmlns")]
    xmlns: String,
    #[serde(rename = "$text")]
    value: WithDefaultsValue,
}

impl WithDefaults {
    fn new(value: WithDefaultsValue) -> WithDefaults {
        WithDefaults {
            xmlns: "urn:ietf:params:xml:ns:yang:ietf-netconf-with-defaults".to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithDefaultsValue {
    ReportAll,
    ReportAllTagged,
    Trim,
    Explicit,
}

impl FromStr for WithDefaultsValue {
    type Err = error::NetconfClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let defaults = s.to_lowercase();
        match defaults.as_str() {
            "report-all" => Ok(WithDefaultsValue::ReportAll),
            "report-all-tagged" => Ok(WithDefaultsValue::ReportAllTagged),
            "trim" => Ok(WithDefaultsValue::Trim),
            "explicit" => Ok(WithDefaultsValue::Explicit),
            _ => Err(error::NetconfClientError::new(format!(
                "unknown with-defaults value: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct Source {
    #[serde(rename = "$value")]
    datastore: Datastore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    Candidate,
    Running,
    Startup,
    Url(String),
}

impl FromStr for Datastore {
    type Err = error::NetconfClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let datastore = s.to_lowercase();
        match datastore.as_str() {
            "running" => Ok(Datastore::Running),
            "candidate" => Ok(Datastore::Candidate),
            "startup" => Ok(Datastore::Startup),
            _ => {
                if datastore.starts_with("http")
                    || datastore.starts_with("file")
                    || datastore.starts_with("ftp")
                {
                    Ok(Datastore::Url(s.to_string()))
                } else {
                    Err(error::NetconfClientError::UnknownDatastore {
                        expected: vec![
                            "running".to_string(),
                            "candidate".to_string(),
                            "startup".to_string(),
                            "ftp|http|file".to_string(),
                        ],
                        unknown: datastore,
                    })
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Filter {
    #[serde(rename = "@type")]
    filter_type: String,
    #[serde(rename = "$value")]
    filter: String,
}

impl Filter {
    pub fn subtree(filter: &str) -> Filter {
        Filter {
            filter_type: "subtree".to_string(),
            filter: strip_slashes(filter).trim().to_string(),
        }
    }
}

// Shell-escaped filters (`\"`) arrive with their backslashes intact.
fn strip_slashes(s: &str) -> String {
    let mut n = String::with_capacity(s.len());
    let mut chars = s.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    n.push(escaped);
                }
            }
            c => n.push(c),
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetconfClientError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_close_session() {
        assert_eq!(CloseSession.to_xml().unwrap(), "<close-session/>");
    }

    #[test]
    fn test_serialize_kill_session() {
        let expected = "<kill-session><session-id>69</session-id></kill-session>";
        assert_eq!(KillSession::new(69).to_xml().unwrap(), expected);
    }

    #[test]
    fn test_serialize_get_config() {
        let expected = r#"<get-config><source><running/></source><with-defaults xmlns="urn:ietf:params:xml:ns:yang:ietf-netconf-with-defaults">report-all</with-defaults></get-config>"#;
        let get_config = GetConfig::new(
            Datastore::Running,
            None,
            Some(WithDefaultsValue::ReportAll),
        );
        assert_eq!(get_config.to_xml().unwrap(), expected);
    }

    #[test]
    fn test_serialize_get() {
        let expected = r#"<get><filter type="subtree"><top xmlns="https://example.com/schema/1.2/config"><users><user><name>fred</name></user></users></top></filter></get>"#;
        let filter = r#"<top xmlns=\"https://example.com/schema/1.2/config\"><users><user><name>fred</name></user></users></top>"#;
        let get = Get::new(Some(Filter::subtree(filter)), None);
        assert_eq!(get.to_xml().unwrap(), expected);
    }

    #[test]
    fn test_raw_method_is_trimmed() {
        let raw = RawMethod::new("\n  <get-schema><identifier>ietf-interfaces</identifier></get-schema>\n");
        assert_eq!(
            raw.to_xml().unwrap(),
            "<get-schema><identifier>ietf-interfaces</identifier></get-schema>"
        );
    }

    #[test]
    fn test_parse_datastore() {
        assert_eq!(Datastore::from_str("Running").unwrap(), Datastore::Running);
        assert_eq!(
            Datastore::from_str("file:///tmp/backup.xml").unwrap(),
            Datastore::Url("file:///tmp/backup.xml".to_string())
        );
        assert!(matches!(
            Datastore::from_str("startu"),
            Err(NetconfClientError::UnknownDatastore { .. })
        ));
        assert_eq!(
            WithDefaultsValue::from_str("trim").unwrap(),
            WithDefaultsValue::Trim
        );
        assert!(WithDefaultsValue::from_str("all").is_err());
    }
}
