// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::io::{
    self,
    BufRead,
    Write,
};

use serde::{
    de::DeserializeOwned,
    Serialize,
};

use super::{
    Codec,
    Decoder,
    Encoder,
    Reusable,
};
use crate::error::{
    DecodeError,
    EncodeError,
};

const ROOT: &str = "value";

/// One `<value>` element per line.
///
/// Line breaks inside a document are written as character references, which
/// keeps the line framing intact. So is whitespace at either end of a text
/// node, which the reader would otherwise trim.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlCodec;

impl XmlCodec {
    pub fn new() -> XmlCodec {
        XmlCodec
    }
}

impl Codec for XmlCodec {
    type Decoder = XmlDecoder;
    type Encoder = XmlEncoder;

    fn encoder(&self) -> XmlEncoder {
        XmlEncoder
    }

    fn decoder(&self) -> XmlDecoder {
        XmlDecoder
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct XmlEncoder;

impl Encoder for XmlEncoder {
    fn encode<T>(&mut self, sink: &mut dyn Write, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized + 'static,
    {
        let document =
            quick_xml::se::to_string_with_root(ROOT, value).map_err(|e| EncodeError::Xml(e.to_string()))?;
        let line = protect_whitespace(&document);
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        Ok(())
    }
}

impl Reusable for XmlEncoder {}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn push_reference(line: &mut String, c: char) {
    line.push_str(&format!("&#{};", u32::from(c)));
}

/// Copy `document` onto a single line. Markup is copied as is, except for line
/// breaks. Text nodes keep their inner whitespace, but whitespace at either end
/// becomes character references.
fn protect_whitespace(document: &str) -> String {
    let mut line = String::with_capacity(document.len());
    let mut text = String::new();
    let mut in_tag = false;
    for c in document.chars() {
        if in_tag {
            match c {
                '\r' | '\n' => push_reference(&mut line, c),
                '>' => {
                    in_tag = false;
                    line.push(c);
                },
                _ => line.push(c),
            }
        } else if c == '<' {
            push_text(&mut line, &text);
            text.clear();
            in_tag = true;
            line.push(c);
        } else {
            text.push(c);
        }
    }
    push_text(&mut line, &text);
    line
}

fn push_text(line: &mut String, text: &str) {
    let body_start = text.len() - text.trim_start_matches(is_xml_space).len();
    let (leading, rest) = text.split_at(body_start);
    let (body, trailing) = rest.split_at(rest.trim_end_matches(is_xml_space).len());

    leading.chars().for_each(|c| push_reference(line, c));
    for c in body.chars() {
        match c {
            '\r' | '\n' => push_reference(line, c),
            _ => line.push(c),
        }
    }
    trailing.chars().for_each(|c| push_reference(line, c));
}

#[derive(Clone, Copy, Debug, Default)]
pub struct XmlDecoder;

impl Decoder for XmlDecoder {
    fn decode<T>(&mut self, source: &mut dyn BufRead) -> Result<T, DecodeError>
    where
        T: DeserializeOwned + 'static,
    {
        let mut line = String::new();
        if source.read_line(&mut line)? == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        let document = line.trim_end_matches(&['\r', '\n'][..]);
        quick_xml::de::from_str(document).map_err(|e| DecodeError::Xml(e.to_string()))
    }
}

impl Reusable for XmlDecoder {}

#[cfg(test)]
mod tests {
    use serde_derive::{
        Deserialize,
        Serialize,
    };

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u32,
    }

    #[test]
    fn test_stream_of_documents() {
        let ann = Person {
            name: "Ann".to_owned(),
            age: 30,
        };
        let bob = Person {
            name: "Bob & co".to_owned(),
            age: 41,
        };

        let mut stream = XmlCodec.new_encoder(Vec::new());
        stream.encode(&ann).expect("encoded");
        stream.encode(&bob).expect("encoded");
        let (_, bytes) = stream.into_parts();

        let text = String::from_utf8(bytes.clone()).expect("utf-8");
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("<value>"));

        let mut decoder = XmlCodec.new_decoder(&bytes[..]);
        assert_eq!(decoder.decode::<Person>().expect("decoded"), ann);
        assert_eq!(decoder.decode::<Person>().expect("decoded"), bob);
    }

    #[test]
    fn test_text_keeps_surrounding_whitespace() {
        let values = [" hi ", "\ttab", "line\n", "", " ", "a  b", "\r\n two lines \n"];

        let mut stream = XmlCodec.new_encoder(Vec::new());
        for value in values.iter() {
            stream.encode(*value).expect("encoded");
        }
        let padded = Person {
            name: "  Ann\t".to_owned(),
            age: 30,
        };
        stream.encode(&padded).expect("encoded");
        let (_, bytes) = stream.into_parts();

        let text = String::from_utf8(bytes.clone()).expect("utf-8");
        assert_eq!(text.lines().count(), values.len() + 1);
        assert!(text.starts_with("<value>&#32;hi&#32;</value>\n"));

        let mut decoder = XmlCodec.new_decoder(&bytes[..]);
        for value in values.iter() {
            assert_eq!(decoder.decode::<String>().expect("decoded"), *value);
        }
        assert_eq!(decoder.decode::<Person>().expect("decoded"), padded);
    }

    #[test]
    fn test_exhausted_source() {
        match XmlCodec.decoder().decode::<Person>(&mut &b""[..]) {
            Err(DecodeError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected UnexpectedEof, got {:?}", other),
        }
    }
}
