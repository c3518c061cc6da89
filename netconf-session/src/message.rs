use crate::method::RpcMethod;
use crate::NETCONF_URN;
use core::fmt;
use core::fmt::Display;
use quick_xml::de::from_str;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::se::Serializer;
use quick_xml::{DeError, Reader, Writer};
use serde_derive::{Deserialize, Serialize};

pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename(serialize = "hello"))]
pub struct Hello {
    #[serde(rename = "@xmlns", default)]
    xmlns: String,
    #[serde(default)]
    capabilities: Capabilities,
    #[serde(
        rename = "session-id",
        skip_serializing_if = "Option::is_none",
        default
    )]
    session_id: Option<u64>,
}

impl Hello {
    pub fn new<I, S>(capabilities: I) -> Hello
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Hello {
            xmlns: NETCONF_URN.to_string(),
            session_id: None,
            capabilities: Capabilities {
                capability: capabilities.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn from_xml(xml: &str) -> Result<Hello, DeError> {
        from_str(xml)
    }

    pub fn to_xml(&self) -> Result<String, DeError> {
        use serde::Serialize;
        let mut buffer = String::with_capacity(206);
        let ser = Serializer::new(&mut buffer);
        self.serialize(ser)?;
        Ok(buffer)
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities.capability
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .capability
            .iter()
            .any(|cap| cap.trim() == capability)
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session_id
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Capabilities {
    #[serde(default)]
    capability: Vec<String>,
}

/// Encodes an `<rpc>` envelope carrying `methods` in order, prefixed by [`XML_HEADER`].
pub fn encode_rpc(message_id: &str, methods: &[&dyn RpcMethod]) -> Result<Vec<u8>, DeError> {
    let mut writer = Writer::new(XML_HEADER.as_bytes().to_vec());

    let mut rpc = BytesStart::new("rpc");
    rpc.push_attribute(("message-id", message_id));
    rpc.push_attribute(("xmlns", NETCONF_URN));
    writer.write_event(Event::Start(rpc))?;
    for method in methods {
        let xml = method.to_xml()?;
        writer.write_event(Event::Text(BytesText::from_escaped(xml)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("rpc")))?;

    Ok(writer.into_inner())
}

/// Reads the `message-id` attribute of an `<rpc-reply>` frame without decoding the rest.
pub(crate) fn reply_message_id(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                if element.local_name().as_ref() != b"rpc-reply" {
                    return None;
                }
                let attribute = element.try_get_attribute("message-id").ok()??;
                return attribute.unescape_value().ok().map(|id| id.into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RpcReply {
    #[serde(rename = "@message-id", default)]
    message_id: Option<String>,
    #[serde(rename = "rpc-error", default)]
    errors: Vec<RpcError>,
    #[serde(default)]
    ok: Option<()>,
    #[serde(skip)]
    raw: String,
}

impl RpcReply {
    /// Decodes `raw` and keeps it alongside the decoded structure.
    pub fn decode(raw: &str) -> Result<RpcReply, DeError> {
        let mut reply: RpcReply = from_str(raw)?;
        reply.raw = raw.to_string();
        Ok(reply)
    }

    pub fn is_ok(&self) -> bool {
        self.ok.is_some() && self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[RpcError] {
        &self.errors
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Inner XML of the first `<data>` element, `Some("")` for `<data/>`.
    pub fn data(&self) -> Option<&str> {
        let mut reader = Reader::from_str(&self.raw);
        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) if element.local_name().as_ref() == b"data" => {
                    let end = element.to_end().into_owned();
                    let span = reader.read_to_end(end.name()).ok()?;
                    return self.raw.get(span.start as usize..span.end as usize);
                }
                Ok(Event::Empty(element)) if element.local_name().as_ref() == b"data" => {
                    return Some("");
                }
                Ok(Event::Eof) | Err(_) => return None,
                _ => {}
            }
        }
    }
}

impl Display for RpcReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "rpc-error", rename_all = "kebab-case")]
pub struct RpcError {
    #[serde(default)]
    error_type: Option<ErrorType>,
    #[serde(default)]
    error_tag: Option<ErrorTag>,
    #[serde(default)]
    error_severity: ErrorSeverity,
    #[serde(default)]
    error_app_tag: Option<String>,
    #[serde(default)]
    error_path: Option<String>,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
    #[serde(default)]
    error_info: Option<ErrorInfo>,
}

impl RpcError {
    pub fn severity(&self) -> &ErrorSeverity {
        &self.error_severity
    }

    pub fn error_type(&self) -> Option<&ErrorType> {
        self.error_type.as_ref()
    }

    pub fn tag(&self) -> Option<&ErrorTag> {
        self.error_tag.as_ref()
    }

    pub fn app_tag(&self) -> Option<&str> {
        self.error_app_tag.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.error_path.as_deref().map(str::trim)
    }

    pub fn message(&self) -> Option<&str> {
        self.error_message
            .as_ref()
            .map(|message| message.text.trim())
    }

    pub fn info(&self) -> Option<&ErrorInfo> {
        self.error_info.as_ref()
    }

    /// Whether this entry fails the request. Only `error`, and `warning` when
    /// `err_on_warning` is set, are fatal.
    pub fn is_fatal(&self, err_on_warning: bool) -> bool {
        match self.error_severity {
            ErrorSeverity::Error => true,
            ErrorSeverity::Warning => err_on_warning,
            ErrorSeverity::Other(_) => false,
        }
    }
}

impl Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.error_severity)?;
        if let Some(tag) = &self.error_tag {
            write!(f, " {}", tag)?;
        }
        match self.message() {
            Some(message) => write!(f, " {}", message),
            None => Ok(()),
        }
    }
}

impl std::error::Error for RpcError {}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
struct ErrorMessage {
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSeverity {
    Error,
    Warning,
    /// Anything the peer sent that is not `error` or `warning`, including an
    /// absent `<error-severity>`.
    Other(String),
}

impl Default for ErrorSeverity {
    fn default() -> Self {
        ErrorSeverity::Other(String::new())
    }
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorSeverity::Error => "error",
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Other(other) => other,
        }
    }
}

impl From<&str> for ErrorSeverity {
    fn from(severity: &str) -> Self {
        match severity.trim() {
            "error" => ErrorSeverity::Error,
            "warning" => ErrorSeverity::Warning,
            other => ErrorSeverity::Other(other.to_string()),
        }
    }
}

impl<'de> serde::Deserialize<'de> for ErrorSeverity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let severity = <String as serde::Deserialize>::deserialize(deserializer)?;
        Ok(ErrorSeverity::from(severity.as_str()))
    }
}

impl Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Closed vocabularies that still accept values outside RFC 6241 as `Other`.
macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal $(| $alias:literal)*,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Other(other) => other,
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value.trim() {
                    $($text $(| $alias)* => $name::$variant,)+
                    other => $name::Other(other.to_string()),
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = <String as serde::Deserialize>::deserialize(deserializer)?;
                Ok($name::from(value.as_str()))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// `<error-type>`, the layer the error occurred in.
    ErrorType {
        Transport => "transport",
        Rpc => "rpc",
        Protocol => "protocol",
        Application => "application" | "app",
    }
}

vocabulary! {
    /// `<error-tag>`, [RFC6241 Appendix A](https://www.rfc-editor.org/rfc/rfc6241.html#appendix-A).
    ErrorTag {
        InUse => "in-use",
        InvalidValue => "invalid-value",
        TooBig => "too-big",
        MissingAttribute => "missing-attribute",
        BadAttribute => "bad-attribute",
        UnknownAttribute => "unknown-attribute",
        MissingElement => "missing-element",
        BadElement => "bad-element",
        UnknownElement => "unknown-element",
        UnknownNamespace => "unknown-namespace",
        AccessDenied => "access-denied",
        LockDenied => "lock-denied",
        ResourceDenied => "resource-denied",
        RollbackFailed => "rollback-failed",
        DataExists => "data-exists",
        DataMissing => "data-missing",
        OperationNotSupported => "operation-not-supported",
        OperationFailed => "operation-failed",
        PartialOperation => "partial-operation",
        MalformedMessage => "malformed-message",
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ErrorInfo {
    #[serde(default)]
    pub bad_element: Option<String>,
    #[serde(default)]
    pub bad_attribute: Option<String>,
    #[serde(default)]
    pub bad_namespace: Option<String>,
    #[serde(default)]
    pub ok_element: Option<String>,
    #[serde(default)]
    pub err_element: Option<String>,
    #[serde(default)]
    pub noop_element: Option<String>,
    #[serde(default)]
    pub session_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::RawMethod;
    use crate::{NETCONF_BASE_10_CAP, NETCONF_BASE_11_CAP};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_rpc_reply() {
        let reply = r#"
<rpc-reply message-id="67d83d6b-1f0b-47fb-8fdf-2cfc3fb2a371" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <rpc-error>
    <error-type>protocol</error-type>
    <error-tag>bad-element</error-tag>
    <error-severity>error</error-severity>
    <error-message xml:lang="en">Element is not valid in the specified context.</error-message>
    <error-info>
      <bad-element>startu</bad-element>
    </error-info>
  </rpc-error>
  <rpc-error>
    <error-type>app</error-type>
    <error-tag>bad-element</error-tag>
    <error-severity>warning</error-severity>
    <error-message>Element is not valid in the specified context.</error-message>
  </rpc-error>
</rpc-reply>
"#;
        let reply = RpcReply::decode(reply).unwrap();
        assert_eq!(
            reply.message_id(),
            Some("67d83d6b-1f0b-47fb-8fdf-2cfc3fb2a371")
        );
        assert_eq!(reply.errors().len(), 2);

        let first = &reply.errors()[0];
        assert_eq!(first.severity(), &ErrorSeverity::Error);
        assert_eq!(first.error_type(), Some(&ErrorType::Protocol));
        assert_eq!(first.tag(), Some(&ErrorTag::BadElement));
        assert_eq!(
            first.message(),
            Some("Element is not valid in the specified context.")
        );
        assert_eq!(
            first.info().and_then(|info| info.bad_element.as_deref()),
            Some("startu")
        );
        assert_eq!(reply.errors()[1].severity(), &ErrorSeverity::Warning);
        assert_eq!(
            reply.errors()[1].error_type(),
            Some(&ErrorType::Application)
        );
        assert!(!reply.is_ok());

        let reply = r#"
<rpc-reply message-id="c60e637d-0f79-41ea-ad09-a5ee02f08434">
  <data>
    <configure xmlns="urn:nokia.com:sros:ns:yang:sr:conf">
      <port>
        <port-id>1/1/2</port-id>
      </port>
    </configure>
  </data>
</rpc-reply>
        "#;
        let reply = RpcReply::decode(reply).unwrap();
        assert!(!reply.has_errors());
        assert!(reply.ok.is_none());
        assert!(reply.data().unwrap().contains("<port-id>1/1/2</port-id>"));

        let reply = r#"
<?xml version="1.0" encoding="UTF-8"?>
<rpc-reply message-id="938f1c28-e6e3-4641-a4d0-383d9ef1a280" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <ok/>
</rpc-reply>
"#;
        let reply = RpcReply::decode(reply).unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.data(), None);
    }

    #[test]
    fn test_severity_vocabulary() {
        assert_eq!(ErrorSeverity::from(" error\n"), ErrorSeverity::Error);
        assert_eq!(ErrorSeverity::from("warning"), ErrorSeverity::Warning);
        assert_eq!(
            ErrorSeverity::from("critical"),
            ErrorSeverity::Other("critical".to_string())
        );

        let reply = RpcReply::decode(
            "<rpc-reply><rpc-error><error-severity>critical</error-severity></rpc-error><rpc-error/></rpc-reply>"
        )
        .unwrap();
        let errors = reply.errors();
        assert_eq!(errors.len(), 2);
        assert!(!errors[0].is_fatal(true));
        assert_eq!(errors[1].severity(), &ErrorSeverity::Other(String::new()));
        assert!(!errors[1].is_fatal(true));
    }

    #[test]
    fn test_error_vocabulary_outside_rfc() {
        let reply = RpcReply::decode(
            r#"<rpc-reply message-id="5">
  <rpc-error>
    <error-type>application</error-type>
    <error-tag>vendor-specific</error-tag>
    <error-severity>error</error-severity>
    <error-message>license expired</error-message>
  </rpc-error>
  <rpc-error>
    <error-type>firmware</error-type>
    <error-tag> in-use </error-tag>
    <error-severity>warning</error-severity>
  </rpc-error>
</rpc-reply>"#,
        )
        .unwrap();

        let first = &reply.errors()[0];
        assert_eq!(first.error_type(), Some(&ErrorType::Application));
        assert_eq!(
            first.tag(),
            Some(&ErrorTag::Other("vendor-specific".to_string()))
        );
        assert_eq!(first.to_string(), "[error] vendor-specific license expired");

        let second = &reply.errors()[1];
        assert_eq!(
            second.error_type(),
            Some(&ErrorType::Other("firmware".to_string()))
        );
        assert_eq!(second.tag(), Some(&ErrorTag::InUse));
        assert_eq!(ErrorType::from("app"), ErrorType::Application);
        assert_eq!(ErrorType::Application.as_str(), "application");
    }

    #[test]
    fn test_fatal_severity() {
        let reply = RpcReply::decode(
            "<rpc-reply><rpc-error><error-severity>warning</error-severity></rpc-error><rpc-error><error-severity>error</error-severity></rpc-error></rpc-reply>"
        )
        .unwrap();
        let warning = &reply.errors()[0];
        let error = &reply.errors()[1];
        assert!(!warning.is_fatal(false));
        assert!(warning.is_fatal(true));
        assert!(error.is_fatal(false));
        assert_eq!(warning.to_string(), "[warning]");
    }

    #[test]
    fn test_decode_keeps_raw_text() {
        let raw = r#"<rpc-reply message-id="7"><ok/></rpc-reply>"#;
        let reply = RpcReply::decode(raw).unwrap();
        assert_eq!(reply.raw(), raw);
        assert_eq!(RpcReply::decode(reply.raw()).unwrap(), reply);
    }

    #[test]
    fn test_empty_data() {
        let reply = RpcReply::decode(r#"<rpc-reply message-id="1"><data/></rpc-reply>"#)
            .unwrap();
        assert_eq!(reply.data(), Some(""));
    }

    #[test]
    fn test_serialize_hello() {
        let expected = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities><capability>urn:ietf:params:netconf:base:1.0</capability><capability>urn:ietf:params:netconf:base:1.1</capability></capabilities></hello>"#;
        let hello = Hello::new([NETCONF_BASE_10_CAP, NETCONF_BASE_11_CAP]);

        assert_eq!(hello.to_xml().unwrap(), expected.trim());
    }

    #[test]
    fn test_deserialize_server_hello() {
        let hello = r#"
<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.1</capability>
    <capability>urn:ietf:params:netconf:capability:candidate:1.0</capability>
  </capabilities>
  <session-id>4</session-id>
</hello>
"#;
        let hello = Hello::from_xml(hello).unwrap();
        assert_eq!(hello.session_id(), Some(4));
        assert_eq!(
            hello.capabilities(),
            &[
                "urn:ietf:params:netconf:base:1.1".to_string(),
                "urn:ietf:params:netconf:capability:candidate:1.0".to_string(),
            ]
        );
        assert!(hello.has_capability(NETCONF_BASE_11_CAP));
        assert!(!hello.has_capability(NETCONF_BASE_10_CAP));
    }

    #[test]
    fn test_encode_rpc() {
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<rpc message-id="101" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><get-config><source><running/></source></get-config><lock><target><candidate/></target></lock></rpc>"#;
        let get_config = RawMethod::new("<get-config><source><running/></source></get-config>");
        let lock = RawMethod::new("<lock><target><candidate/></target></lock>");

        let request = encode_rpc("101", &[&get_config, &lock]).unwrap();
        assert_eq!(String::from_utf8(request).unwrap(), expected);
    }

    #[test]
    fn test_reply_message_id() {
        let reply = r#"<?xml version="1.0" encoding="UTF-8"?>
<nc:rpc-reply xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="a&amp;b"><nc:ok/></nc:rpc-reply>"#;
        assert_eq!(reply_message_id(reply), Some("a&b".to_string()));
        assert_eq!(reply_message_id("<rpc-reply><ok/></rpc-reply>"), None);
        assert_eq!(reply_message_id("<notification/>"), None);
    }
}
