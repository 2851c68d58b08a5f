//! Content stream token assembly.
//!
//! `ContentTokenizer` turns the primitive tokens of one content stream into
//! a flat pull sequence of complete operands, bare instruction names and
//! inline images (BI/ID/EI). Arrays and dictionaries are assembled on a
//! context stack. `None` marks the end of the stream.

use crate::error::{PdfError, Result};
use crate::model::objects::PDFObjRef;
use crate::model::operand::{Operand, OperandValue};
use crate::parser::lexer::{ContentLexer, Token};
use bytes::Bytes;
use indexmap::IndexMap;

/// Inline image dictionary, in stream order.
pub type InlineDict = IndexMap<String, Operand>;

/// Token types produced by ContentTokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken {
    /// An operand (number, string, name, array, dict, bool, null)
    Operand(Operand),
    /// A bare instruction name (BT, ET, Tj, ...)
    Operator(String),
    /// An inline image with dictionary and data
    InlineImage { dict: InlineDict, data: Vec<u8> },
}

/// Context frame for tracking array/dict construction
#[derive(Debug)]
enum Context {
    Array(usize, Vec<Operand>),
    Dict(usize, Vec<Operand>),
}

/// Intermediate item: a finished operand or a top-level keyword.
enum Item {
    Operand(Operand),
    Keyword(String),
}

/// Replace the two integers ending `stack` with an indirect reference, as
/// read from `objid genno R`. False if the stack does not end that way.
pub fn fold_reference(stack: &mut Vec<Operand>) -> bool {
    let [.., objid, genno] = stack.as_slice() else {
        return false;
    };
    let (&OperandValue::Int(objid), &OperandValue::Int(genno)) = (objid.value(), genno.value())
    else {
        return false;
    };
    let (Ok(objid), Ok(genno)) = (u32::try_from(objid), u32::try_from(genno)) else {
        return false;
    };
    stack.truncate(stack.len() - 2);
    stack.push(Operand::reference(PDFObjRef::new(objid, genno)));
    true
}

/// Pull-based tokenizer over one content stream.
pub struct ContentTokenizer {
    lexer: ContentLexer,
    context_stack: Vec<Context>,
    failed: bool,
}

impl ContentTokenizer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            lexer: ContentLexer::new(data),
            context_stack: Vec::new(),
            failed: false,
        }
    }

    /// Get next token with its byte offset.
    ///
    /// After the first error the tokenizer is exhausted.
    pub fn next_with_pos(&mut self) -> Option<Result<(usize, ContentToken)>> {
        if self.failed {
            return None;
        }
        let result = self.advance();
        if matches!(result, Some(Err(_))) {
            self.failed = true;
        }
        result
    }

    fn advance(&mut self) -> Option<Result<(usize, ContentToken)>> {
        let (pos, item) = match self.next_item()? {
            Ok(item) => item,
            Err(e) => return Some(Err(e)),
        };
        let token = match item {
            Item::Operand(op) => ContentToken::Operand(op),
            Item::Keyword(kw) if kw == "BI" => {
                return Some(self.read_inline_image().map(|token| (pos, token)));
            }
            Item::Keyword(kw) => ContentToken::Operator(kw),
        };
        Some(Ok((pos, token)))
    }

    fn next_item(&mut self) -> Option<Result<(usize, Item)>> {
        loop {
            let (pos, token) = match self.lexer.next_token() {
                Some(Ok(t)) => t,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    if let Some(ctx) = self.context_stack.pop() {
                        let (kind, at) = match ctx {
                            Context::Array(at, _) => ("array", at),
                            Context::Dict(at, _) => ("dictionary", at),
                        };
                        return Some(Err(PdfError::TokenError {
                            pos: at,
                            msg: format!("unterminated {kind}"),
                        }));
                    }
                    return None;
                }
            };

            let operand = match token {
                Token::ArrayStart | Token::BraceOpen => {
                    self.context_stack.push(Context::Array(pos, Vec::new()));
                    continue;
                }
                Token::DictStart => {
                    self.context_stack.push(Context::Dict(pos, Vec::new()));
                    continue;
                }
                Token::ArrayEnd | Token::BraceClose => match self.context_stack.pop() {
                    Some(Context::Array(_, items)) => Operand::array(items),
                    _ => {
                        return Some(Err(PdfError::TokenError {
                            pos,
                            msg: "unexpected array end".into(),
                        }));
                    }
                },
                Token::DictEnd => match self.context_stack.pop() {
                    Some(Context::Dict(_, items)) => match build_dict(items) {
                        Ok(dict) => Operand::dict(dict),
                        Err(msg) => return Some(Err(PdfError::TokenError { pos, msg })),
                    },
                    _ => {
                        return Some(Err(PdfError::TokenError {
                            pos,
                            msg: "unexpected dictionary end".into(),
                        }));
                    }
                },
                Token::Keyword(kw) if kw == "R" && self.fold_in_context() => continue,
                Token::Keyword(kw) => {
                    if !self.context_stack.is_empty() {
                        return Some(Err(PdfError::TokenError {
                            pos,
                            msg: format!("operator {kw:?} inside array or dictionary"),
                        }));
                    }
                    return Some(Ok((pos, Item::Keyword(kw))));
                }
                Token::Int(n) => Operand::int(n),
                Token::Real(n) => Operand::real(n),
                Token::Bool(b) => Operand::bool(b),
                Token::Null => Operand::null(),
                Token::Literal(name) => Operand::name(name),
                Token::String(s) => Operand::string(s),
            };

            if self.push_to_context(&operand) {
                continue;
            }
            return Some(Ok((pos, Item::Operand(operand))));
        }
    }

    /// Fold `objid genno R` inside the open array or dictionary.
    fn fold_in_context(&mut self) -> bool {
        match self.context_stack.last_mut() {
            Some(Context::Array(_, items) | Context::Dict(_, items)) => fold_reference(items),
            None => false,
        }
    }

    /// Push an operand to the current context; false at top level.
    fn push_to_context(&mut self, operand: &Operand) -> bool {
        match self.context_stack.last_mut() {
            Some(Context::Array(_, items) | Context::Dict(_, items)) => {
                items.push(operand.clone());
                true
            }
            None => false,
        }
    }

    fn read_inline_image(&mut self) -> Result<ContentToken> {
        let mut entries = Vec::new();
        loop {
            match self.next_item() {
                Some(Ok((_, Item::Operand(op)))) => entries.push(op),
                Some(Ok((_, Item::Keyword(kw)))) if kw == "ID" => break,
                Some(Ok((_, Item::Keyword(kw)))) => {
                    return Err(PdfError::malformed(
                        "BI",
                        format!("unexpected operator {kw:?} in inline image dictionary"),
                    ));
                }
                Some(Err(e)) => return Err(e),
                None => return Err(PdfError::UnexpectedEof),
            }
        }
        let dict = build_dict(entries).map_err(|msg| PdfError::malformed("BI", msg))?;

        if is_ascii85(&dict) {
            let mut data = self.lexer.read_inline_data(b"~>");
            data.extend_from_slice(b"~>");
            match self.next_item() {
                Some(Ok((_, Item::Keyword(kw)))) if kw == "EI" => {}
                _ => return Err(PdfError::malformed("BI", "inline image missing EI")),
            }
            return Ok(ContentToken::InlineImage { dict, data });
        }

        let data = self.lexer.read_inline_data(b"EI");
        Ok(ContentToken::InlineImage { dict, data })
    }
}

impl Iterator for ContentTokenizer {
    type Item = Result<ContentToken>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_with_pos().map(|r| r.map(|(_, token)| token))
    }
}

/// Build dictionary from alternating key/value operands.
fn build_dict(items: Vec<Operand>) -> std::result::Result<InlineDict, String> {
    if items.len() % 2 != 0 {
        return Err("dictionary with odd number of entries".into());
    }
    let mut dict = IndexMap::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let Some(name) = key.as_name() else {
            return Err(format!("dictionary key must be a name, got {}", key.kind()));
        };
        dict.insert(name.to_string(), value);
    }
    Ok(dict)
}

/// Whether the inline image data is ASCII85 encoded (ends with `~>`).
fn is_ascii85(dict: &InlineDict) -> bool {
    let filter = dict.get("F").or_else(|| dict.get("Filter"));
    let first = match filter {
        Some(op) if op.as_name().is_some() => op.as_name(),
        Some(op) => op
            .as_array()
            .and_then(|filters| filters.first())
            .and_then(Operand::as_name),
        None => None,
    };
    matches!(first, Some("A85" | "ASCII85Decode"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(data: &[u8]) -> Vec<ContentToken> {
        ContentTokenizer::new(data.to_vec())
            .collect::<Result<Vec<_>>>()
            .expect("tokenize")
    }

    #[test]
    fn test_simple_parse() {
        assert_eq!(tokens(b"BT ET").len(), 2);
    }

    #[test]
    fn test_nested_array_is_one_operand() {
        let toks = tokens(b"[(a) -120 [1 2]] TJ");
        assert_eq!(toks.len(), 2);
        match &toks[0] {
            ContentToken::Operand(op) => assert_eq!(op.as_array().map(<[_]>::len), Some(3)),
            other => panic!("expected array operand, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_image() {
        let toks = tokens(b"q BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xff EI Q");
        assert_eq!(toks.len(), 3);
        match &toks[1] {
            ContentToken::InlineImage { dict, data } => {
                assert_eq!(dict.len(), 4);
                assert_eq!(data, &vec![0x00, 0xff]);
            }
            other => panic!("expected inline image, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_array_fails() {
        let result: Result<Vec<_>> = ContentTokenizer::new(b"[1 2".to_vec()).collect();
        assert!(result.is_err());
    }
}
