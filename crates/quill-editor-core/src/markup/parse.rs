//! Tolerant single-pass tokenizer and tree builder.
//!
//! Recovers from the usual hand-edited-HTML mistakes: stray close tags are
//! dropped, unclosed elements are closed at the end of their parent, and a
//! `<` that cannot start a tag is text. Only constructs that run off the end
//! of the input are errors.

use quill_common::{MarkupError, MarkupErrorKind};

use super::{Element, Node, decode_entities};

pub(super) fn parse_nodes(src: &str) -> Result<Vec<Node>, MarkupError> {
    Parser::new(src).run()
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    stack: Vec<Element>,
    roots: Vec<Node>,
    text: String,
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            stack: Vec::new(),
            roots: Vec::new(),
            text: String::new(),
        }
    }

    fn bytes(&self) -> &'s [u8] {
        self.src.as_bytes()
    }

    fn run(mut self) -> Result<Vec<Node>, MarkupError> {
        let src = self.src;
        while self.pos < src.len() {
            match src[self.pos..].find('<') {
                None => {
                    self.text.push_str(&src[self.pos..]);
                    self.pos = src.len();
                }
                Some(rel) => {
                    let lt = self.pos + rel;
                    self.text.push_str(&src[self.pos..lt]);
                    self.pos = lt;
                    self.markup()?;
                }
            }
        }
        self.flush_text();
        while let Some(el) = self.stack.pop() {
            tracing::trace!(tag = el.name(), "closing element left open at end of input");
            self.append(Node::Element(el));
        }
        Ok(self.roots)
    }

    /// Handle whatever starts at the `<` under the cursor.
    fn markup(&mut self) -> Result<(), MarkupError> {
        let src = self.src;
        let rest = &src[self.pos..];
        let next = rest.as_bytes().get(1).copied();

        if let Some(body) = rest.strip_prefix("<!--") {
            let Some(end) = body.find("-->") else {
                return Err(MarkupError::new(
                    MarkupErrorKind::UnterminatedComment,
                    self.pos,
                    rest.len(),
                )
                .with_advice("close the comment with -->"));
            };
            self.flush_text();
            self.append(Node::Comment(body[..end].to_owned()));
            self.pos += 4 + end + 3;
        } else if matches!(next, Some(b'!' | b'?')) {
            let Some(end) = rest.find('>') else {
                return Err(MarkupError::new(
                    MarkupErrorKind::UnterminatedDeclaration,
                    self.pos,
                    rest.len(),
                ));
            };
            self.flush_text();
            self.append(Node::Raw(rest[..=end].to_owned()));
            self.pos += end + 1;
        } else if next == Some(b'/')
            && rest.as_bytes().get(2).is_some_and(|b| b.is_ascii_alphabetic())
        {
            self.end_tag()?;
        } else if next.is_some_and(|b| b.is_ascii_alphabetic()) {
            self.start_tag()?;
        } else {
            self.text.push('<');
            self.pos += 1;
        }
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        let bytes = self.bytes();
        let mut i = start + 2;
        while i < bytes.len() && is_tag_name_byte(bytes[i]) {
            i += 1;
        }
        let name = self.src[start + 2..i].to_ascii_lowercase();
        let Some(gt) = self.src[i..].find('>') else {
            return Err(MarkupError::new(
                MarkupErrorKind::UnterminatedTag(format!("/{name}")),
                start,
                self.src.len() - start,
            ));
        };
        self.pos = i + gt + 1;
        self.flush_text();
        self.close(&name);
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        let src = self.src;
        let bytes = self.bytes();
        let len = bytes.len();

        let mut i = start + 1;
        while i < len && is_tag_name_byte(bytes[i]) {
            i += 1;
        }
        let name = src[start + 1..i].to_ascii_lowercase();
        let mut el = Element::new(&name);
        let unterminated = |name: &str| {
            MarkupError::new(
                MarkupErrorKind::UnterminatedTag(name.to_owned()),
                start,
                len - start,
            )
        };

        let mut self_closing = false;
        loop {
            while i < len && is_space(bytes[i]) {
                i += 1;
            }
            if i >= len {
                return Err(unterminated(name.as_str()));
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' => {
                    if bytes.get(i + 1) == Some(&b'>') {
                        self_closing = true;
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                _ => {
                    let attr_start = i;
                    while i < len
                        && !is_space(bytes[i])
                        && !matches!(bytes[i], b'=' | b'>')
                        && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
                    {
                        i += 1;
                    }
                    if i == attr_start {
                        // `=` with no name in front of it
                        i += 1;
                        continue;
                    }
                    let attr_name = src[attr_start..i].to_ascii_lowercase();

                    let mut j = i;
                    while j < len && is_space(bytes[j]) {
                        j += 1;
                    }
                    if bytes.get(j) != Some(&b'=') {
                        el.push_parsed_attr(attr_name, None);
                        continue;
                    }
                    i = j + 1;
                    while i < len && is_space(bytes[i]) {
                        i += 1;
                    }
                    if i >= len {
                        return Err(unterminated(name.as_str()));
                    }
                    let value = match bytes[i] {
                        quote @ (b'"' | b'\'') => {
                            let Some(end) = src[i + 1..].find(quote as char) else {
                                return Err(MarkupError::new(
                                    MarkupErrorKind::UnterminatedAttribute(attr_name),
                                    i,
                                    len - i,
                                )
                                .with_advice(format!("add the closing {}", quote as char)));
                            };
                            let value = decode_entities(&src[i + 1..i + 1 + end]).into_owned();
                            i = i + 1 + end + 1;
                            value
                        }
                        _ => {
                            let value_start = i;
                            while i < len && !is_space(bytes[i]) && bytes[i] != b'>' {
                                i += 1;
                            }
                            decode_entities(&src[value_start..i]).into_owned()
                        }
                    };
                    el.push_parsed_attr(attr_name, Some(value));
                }
            }
        }

        self.pos = i;
        self.flush_text();
        el.set_self_closing(self_closing);

        if el.is_void() || self_closing {
            self.append(Node::Element(el));
        } else if el.is_raw_text() {
            self.raw_text_body(&mut el)?;
            self.append(Node::Element(el));
        } else {
            self.stack.push(el);
        }
        Ok(())
    }

    /// Consume a raw-text element's content up to and including its close tag.
    fn raw_text_body(&mut self, el: &mut Element) -> Result<(), MarkupError> {
        let src = self.src;
        let rest = &src[self.pos..];
        let needle = format!("</{}", el.name());
        match rest.to_ascii_lowercase().find(&needle) {
            Some(close) => {
                if close > 0 {
                    el.children.push(Node::Text(rest[..close].to_owned()));
                }
                let close_start = self.pos + close;
                let Some(gt) = src[close_start..].find('>') else {
                    return Err(MarkupError::new(
                        MarkupErrorKind::UnterminatedTag(format!("/{}", el.name())),
                        close_start,
                        src.len() - close_start,
                    ));
                };
                self.pos = close_start + gt + 1;
            }
            None => {
                if !rest.is_empty() {
                    el.children.push(Node::Text(rest.to_owned()));
                }
                self.pos = src.len();
            }
        }
        Ok(())
    }

    /// Close the nearest open element named `name`, closing anything opened
    /// inside it first. Close tags with no open match are dropped.
    fn close(&mut self, name: &str) {
        let Some(idx) = self.stack.iter().rposition(|el| el.name() == name) else {
            tracing::trace!(tag = name, "ignoring stray closing tag");
            return;
        };
        while self.stack.len() > idx {
            if let Some(el) = self.stack.pop() {
                self.append(Node::Element(el));
            }
        }
    }

    fn append(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.append(Node::Text(text));
        }
    }
}
