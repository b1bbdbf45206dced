/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::BTreeMap;
use std::fmt::Write;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{Error, Result, Value};

/// Serialize a `<methodCall>` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><methodCall>"#);
    out.push_str("<methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Int(i) => {
            let _ = write!(out, "<i8>{i}</i8>");
        }
        Value::Double(d) => {
            let _ = write!(out, "<double>{d}</double>");
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(s) => {
            out.push_str("<base64>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</base64>");
        }
        Value::Array(values) => {
            out.push_str("<array><data>");
            for v in values {
                write_value(out, v);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, v) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, v);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

/// Parse a `<methodResponse>` document. A `<fault>` is returned as
/// [`Error::Fault`].
pub fn decode_response(body: &str) -> Result<Value> {
    let mut parser = Parser::new(tokenize(body)?);
    parser.open("methodResponse")?;
    parser.skip_whitespace();
    match parser.next() {
        Some(Token::Open(tag)) if tag == "params" => {
            parser.open("param")?;
            let value = parser.value()?;
            parser.close("param")?;
            parser.close("params")?;
            parser.close("methodResponse")?;
            Ok(value)
        }
        Some(Token::Open(tag)) if tag == "fault" => {
            let fault = parser.value()?;
            Err(Error::Fault {
                code: fault
                    .get("faultCode")
                    .and_then(Value::as_i64)
                    .unwrap_or_default(),
                message: fault
                    .get("faultString")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        }
        token => Err(unexpected("params or fault", token)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

fn tag_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn tokenize(body: &str) -> Result<Vec<Token>> {
    let mut reader = Reader::from_str(body);
    let mut tokens = Vec::new();
    loop {
        let token = match reader.read_event()? {
            Event::Start(e) => Token::Open(tag_name(e.local_name().as_ref())),
            Event::End(e) => Token::Close(tag_name(e.local_name().as_ref())),
            Event::Empty(e) => Token::Empty(tag_name(e.local_name().as_ref())),
            Event::Text(e) => Token::Text(e.unescape()?.into_owned()),
            Event::CData(e) => Token::Text(tag_name(&e.into_inner())),
            Event::Eof => break,
            _ => continue,
        };
        if let (Some(Token::Text(prev)), Token::Text(text)) =
            (tokens.last_mut(), &token)
        {
            prev.push_str(text);
            continue;
        }
        tokens.push(token);
    }
    Ok(tokens)
}

fn unexpected(expected: &str, token: Option<Token>) -> Error {
    Error::Malformed(match token {
        Some(token) => format!("expected {expected}, got {token:?}"),
        None => format!("expected {expected}, got end of document"),
    })
}

struct Parser {
    tokens: std::vec::IntoIter<Token>,
    peeked: Option<Token>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter(),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        self.peeked.as_ref()
    }

    fn next(&mut self) -> Option<Token> {
        self.peeked.take().or_else(|| self.tokens.next())
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(Token::Text(t)) if t.trim().is_empty())
        {
            self.next();
        }
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.skip_whitespace();
        match self.next() {
            Some(Token::Open(tag)) if tag == name => Ok(()),
            token => Err(unexpected(&format!("<{name}>"), token)),
        }
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.skip_whitespace();
        match self.next() {
            Some(Token::Close(tag)) if tag == name => Ok(()),
            token => Err(unexpected(&format!("</{name}>"), token)),
        }
    }

    fn at_close(&mut self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Close(tag)) if tag == name)
    }

    fn take_text(&mut self) -> String {
        if matches!(self.peek(), Some(Token::Text(_))) {
            if let Some(Token::Text(text)) = self.next() {
                return text;
            }
        }
        String::new()
    }

    /// Text content up to the closing tag.
    fn text(&mut self, name: &str) -> Result<String> {
        let text = self.take_text();
        match self.next() {
            Some(Token::Close(tag)) if tag == name => Ok(text),
            token => Err(unexpected(&format!("</{name}>"), token)),
        }
    }

    /// A complete `<value>` element.
    fn value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.next() {
            Some(Token::Open(tag)) if tag == "value" => self.value_content(),
            Some(Token::Empty(tag)) if tag == "value" => {
                Ok(Value::String(String::new()))
            }
            token => Err(unexpected("<value>", token)),
        }
    }

    fn value_content(&mut self) -> Result<Value> {
        let text = self.take_text();
        match self.next() {
            /* Untyped values are strings. */
            Some(Token::Close(tag)) if tag == "value" => {
                Ok(Value::String(text))
            }
            Some(Token::Open(tag)) if text.trim().is_empty() => {
                let value = self.typed(&tag)?;
                self.close("value")?;
                Ok(value)
            }
            Some(Token::Empty(tag)) if text.trim().is_empty() => {
                let value = Self::empty_typed(&tag)?;
                self.close("value")?;
                Ok(value)
            }
            token => Err(unexpected("a typed value", token)),
        }
    }

    fn empty_typed(tag: &str) -> Result<Value> {
        match tag {
            "string" => Ok(Value::String(String::new())),
            "base64" => Ok(Value::Base64(String::new())),
            "array" => Ok(Value::Array(Vec::new())),
            "struct" => Ok(Value::Struct(BTreeMap::new())),
            "nil" => Ok(Value::Nil),
            _ => Err(Error::Malformed(format!("empty <{tag}> element"))),
        }
    }

    fn typed(&mut self, tag: &str) -> Result<Value> {
        match tag {
            "string" => self.text(tag).map(Value::String),
            "int" | "i4" | "i8" => {
                let text = self.text(tag)?;
                text.trim().parse().map(Value::Int).map_err(|_| {
                    Error::Malformed(format!("invalid integer {text:?}"))
                })
            }
            "double" => {
                let text = self.text(tag)?;
                text.trim().parse().map(Value::Double).map_err(|_| {
                    Error::Malformed(format!("invalid double {text:?}"))
                })
            }
            "boolean" => match self.text(tag)?.trim() {
                "1" => Ok(Value::Bool(true)),
                "0" => Ok(Value::Bool(false)),
                other => {
                    Err(Error::Malformed(format!("invalid boolean {other:?}")))
                }
            },
            "dateTime.iso8601" => self.text(tag).map(Value::DateTime),
            "base64" => self.text(tag).map(Value::Base64),
            "nil" => {
                self.close(tag)?;
                Ok(Value::Nil)
            }
            "array" => self.array(),
            "struct" => self.members(),
            _ => Err(Error::Malformed(format!("unknown value type <{tag}>"))),
        }
    }

    fn array(&mut self) -> Result<Value> {
        let mut values = Vec::new();
        self.skip_whitespace();
        match self.next() {
            Some(Token::Empty(tag)) if tag == "data" => {}
            Some(Token::Open(tag)) if tag == "data" => loop {
                self.skip_whitespace();
                if self.at_close("data") {
                    self.next();
                    break;
                }
                values.push(self.value()?);
            },
            token => return Err(unexpected("<data>", token)),
        }
        self.close("array")?;
        Ok(Value::Array(values))
    }

    fn members(&mut self) -> Result<Value> {
        let mut members = BTreeMap::new();
        loop {
            self.skip_whitespace();
            match self.next() {
                Some(Token::Close(tag)) if tag == "struct" => break,
                Some(Token::Open(tag)) if tag == "member" => {
                    self.open("name")?;
                    let name = self.text("name")?;
                    let value = self.value()?;
                    self.close("member")?;
                    members.insert(name, value);
                }
                token => return Err(unexpected("<member>", token)),
            }
        }
        Ok(Value::Struct(members))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn encode_login() {
        let body = encode_call(
            "session.login_with_password",
            &[Value::from("root"), Value::from("p<w>&")],
        );
        assert_eq!(
            body,
            "<?xml version=\"1.0\"?><methodCall>\
             <methodName>session.login_with_password</methodName><params>\
             <param><value><string>root</string></value></param>\
             <param><value><string>p&lt;w&gt;&amp;</string></value></param>\
             </params></methodCall>"
        );
    }

    #[test]
    fn encode_nested() {
        let args = BTreeMap::from([
            ("host_uuid".to_string(), Value::from("h-1")),
            ("n".to_string(), Value::Int(3)),
        ]);
        let body = encode_call(
            "host.call_plugin",
            &[Value::Struct(args), Value::Array(vec![Value::Bool(true)])],
        );
        assert!(body.contains(
            "<struct><member><name>host_uuid</name>\
             <value><string>h-1</string></value></member>\
             <member><name>n</name><value><i8>3</i8></value></member>\
             </struct>"
        ));
        assert!(body.contains(
            "<array><data><value><boolean>1</boolean></value></data></array>"
        ));
    }

    #[test]
    fn decode_success_envelope() {
        let body = r#"<?xml version='1.0'?>
<methodResponse>
  <params>
    <param>
      <value><struct>
        <member><name>Status</name><value>Success</value></member>
        <member>
          <name>Value</name>
          <value><array><data>
            <value>OpaqueRef:a</value>
            <value><string>OpaqueRef:b</string></value>
          </data></array></value>
        </member>
      </struct></value>
    </param>
  </params>
</methodResponse>"#;
        let value = decode_response(body).unwrap();
        assert_eq!(value.get("Status"), Some(&Value::from("Success")));
        assert_eq!(
            value.get("Value"),
            Some(&Value::Array(vec![
                Value::from("OpaqueRef:a"),
                Value::from("OpaqueRef:b"),
            ]))
        );
    }

    #[test]
    fn decode_scalars() {
        let body = "<methodResponse><params><param><value><array><data>\
                    <value><double>0.25</double></value>\
                    <value><int>-4</int></value>\
                    <value><boolean>0</boolean></value>\
                    <value><nil/></value>\
                    <value><string/></value>\
                    <value/>\
                    <value><array><data/></array></value>\
                    <value>  padded  </value>\
                    </data></array></value></param></params>\
                    </methodResponse>";
        assert_eq!(
            decode_response(body).unwrap(),
            Value::Array(vec![
                Value::Double(0.25),
                Value::Int(-4),
                Value::Bool(false),
                Value::Nil,
                Value::String(String::new()),
                Value::String(String::new()),
                Value::Array(Vec::new()),
                Value::String("  padded  ".to_string()),
            ])
        );
    }

    #[test]
    fn decode_fault() {
        let body = "<methodResponse><fault><value><struct>\
                    <member><name>faultCode</name>\
                    <value><int>4</int></value></member>\
                    <member><name>faultString</name>\
                    <value>Too many parameters</value></member>\
                    </struct></value></fault></methodResponse>";
        match decode_response(body) {
            Err(Error::Fault { code, message }) => {
                assert_eq!(code, 4);
                assert_eq!(message, "Too many parameters");
            }
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_response("<html><body>502</body></html>").is_err());
        assert!(decode_response(
            "<methodResponse><params><param><value><int>x</int></value>\
             </param></params></methodResponse>"
        )
        .is_err());
    }
}
