//! A minimal tag reader/writer for the fixed documents used by this crate: protocol messages,
//! store snapshots and cache dumps. It understands start/end/empty tags, double or single
//! quoted attributes, text content with the five predefined entities, and an optional
//! `<?xml ...?>` prolog. Anything else is an [`KvsError::InvalidFormat`].
use crate::{KvsError, Result};

/// escapes `text` so it can be used as element content or as an attribute value
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// reverses [`escape`]. Numeric character references are accepted as well
pub(crate) fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let semi = rest[amp..].find(';').ok_or(KvsError::InvalidFormat)? + amp;
        let entity = &rest[amp + 1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => out.push(char_reference(entity)?),
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn char_reference(entity: &str) -> Result<char> {
    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32).ok_or(KvsError::InvalidFormat)
}

/// appends `<name>text</name>` to `out`, escaping the text
pub(crate) fn push_text_element(out: &mut String, name: &str, text: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&escape(text));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// a start tag that has been consumed by the [`XmlReader`]
#[derive(Debug)]
pub(crate) struct StartTag<'a> {
    pub(crate) name: &'a str,
    pub(crate) attrs: Vec<(&'a str, String)>,
    /// true for `<name/>`, which has no content and no end tag
    pub(crate) empty: bool,
}

impl<'a> StartTag<'a> {
    /// the unescaped value of the attribute called `name`
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A forward-only reader over an XML-shaped document held in memory
pub(crate) struct XmlReader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> XmlReader<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        XmlReader { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(KvsError::InvalidFormat)
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(KvsError::InvalidFormat);
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// skips leading whitespace and an `<?xml ...?>` declaration, if present
    pub(crate) fn skip_prolog(&mut self) -> Result<()> {
        self.skip_ws();
        if self.rest().starts_with("<?") {
            let end = self.rest().find("?>").ok_or(KvsError::InvalidFormat)?;
            self.pos += end + 2;
            self.skip_ws();
        }
        Ok(())
    }

    /// true if the next non-whitespace token is an end tag
    pub(crate) fn at_end_tag(&mut self) -> bool {
        self.skip_ws();
        self.rest().starts_with("</")
    }

    /// consumes a start tag (or an empty-element tag) along with its attributes
    pub(crate) fn start_tag(&mut self) -> Result<StartTag<'a>> {
        self.skip_ws();
        self.expect("<")?;
        let name = self.name()?;
        let mut attrs = vec![];
        loop {
            self.skip_ws();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(StartTag { name, attrs, empty: true });
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                return Ok(StartTag { name, attrs, empty: false });
            }
            let attr_name = self.name()?;
            self.skip_ws();
            self.expect("=")?;
            self.skip_ws();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(KvsError::InvalidFormat),
            };
            self.pos += 1;
            let len = self.rest().find(quote).ok_or(KvsError::InvalidFormat)?;
            let raw = &self.rest()[..len];
            self.pos += len + 1;
            attrs.push((attr_name, unescape(raw)?));
        }
    }

    /// consumes the end tag `</name>`
    pub(crate) fn end_tag(&mut self, name: &str) -> Result<()> {
        self.skip_ws();
        self.expect("</")?;
        if self.name()? != name {
            return Err(KvsError::InvalidFormat);
        }
        self.skip_ws();
        self.expect(">")
    }

    /// reads the text content of the element opened by `tag`, including its end tag.
    /// Whitespace inside the element is preserved
    pub(crate) fn text_content(&mut self, tag: &StartTag<'_>) -> Result<String> {
        if tag.empty {
            return Ok(String::new());
        }
        let len = self.rest().find('<').ok_or(KvsError::InvalidFormat)?;
        let text = unescape(&self.rest()[..len])?;
        self.pos += len;
        self.end_tag(tag.name)?;
        Ok(text)
    }

    /// succeeds only if nothing but whitespace is left in the document
    pub(crate) fn finish(&mut self) -> Result<()> {
        self.skip_ws();
        if self.rest().is_empty() {
            Ok(())
        } else {
            Err(KvsError::InvalidFormat)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_covers_markup_characters() {
        let raw = r#"<a href="x">&'</a>"#;
        let escaped = escape(raw);
        assert!(!escaped.contains('<'));
        assert_eq!(unescape(&escaped).unwrap(), raw);
    }

    #[test]
    fn numeric_references_are_decoded() {
        assert_eq!(unescape("&#65;&#x42;c").unwrap(), "ABc");
        assert!(unescape("&bogus;").is_err());
        assert!(unescape("dangling & ampersand").is_err());
    }

    #[test]
    fn reads_nested_elements() {
        let doc = "<?xml version=\"1.0\"?>\n<Root id='7'><Name> spaced </Name><Empty/></Root>  ";
        let mut reader = XmlReader::new(doc);
        reader.skip_prolog().unwrap();
        let root = reader.start_tag().unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.attr("id"), Some("7"));

        let name = reader.start_tag().unwrap();
        assert_eq!(reader.text_content(&name).unwrap(), " spaced ");
        let empty = reader.start_tag().unwrap();
        assert!(empty.empty);
        assert_eq!(reader.text_content(&empty).unwrap(), "");

        assert!(reader.at_end_tag());
        reader.end_tag("Root").unwrap();
        reader.finish().unwrap();
    }

    #[test]
    fn mismatched_end_tag_is_rejected() {
        let mut reader = XmlReader::new("<Key>k</Value>");
        let tag = reader.start_tag().unwrap();
        assert!(matches!(reader.text_content(&tag), Err(KvsError::InvalidFormat)));
    }
}
