use crate::{colors::ColorGroup, tree::Node};

/// Single item of a [`ColorCane`].
#[derive(Debug, Clone)]
pub struct ColorCanePiece<'t> {
    pub text: String,
    /// Node associated with the text, if any.
    pub node: Option<&'t Node<'t>>,
    pub hi: ColorGroup,
}

/// A string made of pieces, each of which carries an associated node and a
/// color group.
#[derive(Debug, Clone, Default)]
pub struct ColorCane<'t> {
    pieces: Vec<ColorCanePiece<'t>>,
}

impl<'t> ColorCane<'t> {
    /// Appends a string, merging it into the last piece when the metadata
    /// matches. Empty strings are dropped.
    pub fn append(&mut self, text: &str, node: Option<&'t Node<'t>>, hi: ColorGroup) {
        if text.is_empty() {
            return;
        }
        if self.can_append(node, hi) {
            self.pieces
                .last_mut()
                .expect("can_append checked for a last piece")
                .text
                .push_str(text);
        } else {
            self.pieces.push(ColorCanePiece {
                text: text.to_owned(),
                node,
                hi,
            });
        }
    }

    /// Appends a single character.
    pub fn append_char(&mut self, text: char, hi: ColorGroup, node: Option<&'t Node<'t>>) {
        let mut buffer = [0_u8; 4];
        self.append(text.encode_utf8(&mut buffer), node, hi);
    }

    /// Appends a character repeated `count` times.
    pub fn append_repeated(
        &mut self,
        text: char,
        count: usize,
        hi: ColorGroup,
        node: Option<&'t Node<'t>>,
    ) {
        if count > 0 {
            self.append(&text.to_string().repeat(count), node, hi);
        }
    }

    fn can_append(&self, node: Option<&'t Node<'t>>, hi: ColorGroup) -> bool {
        self.pieces
            .last()
            .is_some_and(|piece| piece.node == node && piece.hi == hi)
    }

    pub fn pieces(&self) -> &[ColorCanePiece<'t>] {
        &self.pieces
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Breaks the cane into canes none of which contain a newline.
    pub fn split_into_lines(self) -> Vec<ColorCane<'t>> {
        let mut split = vec![ColorCane::default()];
        for piece in self.pieces {
            let mut rest = piece.text.as_str();
            loop {
                match rest.find('\n') {
                    None => {
                        split
                            .last_mut()
                            .expect("split always holds at least one cane")
                            .append(rest, piece.node, piece.hi);
                        break;
                    }
                    Some(pos) => {
                        split
                            .last_mut()
                            .expect("split always holds at least one cane")
                            .append(&rest[..pos], piece.node, piece.hi);
                        rest = &rest[pos + 1..];
                        split.push(ColorCane::default());
                    }
                }
            }
        }
        split
    }

    /// Breaks the cane in two at the first character that is not one of the
    /// separators; the first cane receives the leading separator run.
    pub fn break_at(self, separators: &str) -> [ColorCane<'t>; 2] {
        let mut head = ColorCane::default();
        let mut tail = ColorCane::default();
        let mut in_tail = false;

        for piece in self.pieces {
            if in_tail {
                tail.append(&piece.text, piece.node, piece.hi);
                continue;
            }

            match piece.text.find(|c| !separators.contains(c)) {
                None => head.append(&piece.text, piece.node, piece.hi),
                Some(pos) => {
                    head.append(&piece.text[..pos], piece.node, piece.hi);
                    tail.append(&piece.text[pos..], piece.node, piece.hi);
                    in_tail = true;
                }
            }
        }

        [head, tail]
    }
}

impl<'t> IntoIterator for ColorCane<'t> {
    type Item = ColorCanePiece<'t>;
    type IntoIter = std::vec::IntoIter<ColorCanePiece<'t>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.into_iter()
    }
}

impl<'a, 't> IntoIterator for &'a ColorCane<'t> {
    type Item = &'a ColorCanePiece<'t>;
    type IntoIter = std::slice::Iter<'a, ColorCanePiece<'t>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.iter()
    }
}
