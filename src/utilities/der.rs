use crate::models::errors::NotificationError;

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_SEQUENCE: u8 = 0x30;

/// One tag-length-value element with its content borrowed from the input.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub tag: u8,
    pub content: &'a [u8],
}

/// Minimal DER reader: just enough TLV walking to pull RSA key integers out
/// of a private-key encoding. Definite lengths only.
pub struct DerReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], NotificationError> {
        if self.pos + n > self.input.len() {
            return Err(malformed("truncated DER element"));
        }
        let slice = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_byte(&mut self) -> Result<u8, NotificationError> {
        Ok(self.take(1)?[0])
    }

    fn read_length(&mut self) -> Result<usize, NotificationError> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        // 0x80 is the indefinite form, which DER forbids
        if count == 0 || count > 4 {
            return Err(malformed("unsupported DER length encoding"));
        }
        let mut len = 0usize;
        for byte in self.take(count)? {
            len = (len << 8) | *byte as usize;
        }
        Ok(len)
    }

    pub fn read_element(&mut self) -> Result<Element<'a>, NotificationError> {
        let tag = self.read_byte()?;
        let len = self.read_length()?;
        let content = self.take(len)?;
        Ok(Element { tag, content })
    }

    /// Reads elements until the input is exhausted.
    pub fn read_all(mut self) -> Result<Vec<Element<'a>>, NotificationError> {
        let mut elements = Vec::new();
        while !self.is_empty() {
            elements.push(self.read_element()?);
        }
        Ok(elements)
    }
}

/// Expects `input` to be a single SEQUENCE spanning the whole buffer and
/// returns its child elements.
pub fn sequence_elements(input: &[u8]) -> Result<Vec<Element<'_>>, NotificationError> {
    let mut reader = DerReader::new(input);
    let outer = reader.read_element()?;
    if outer.tag != TAG_SEQUENCE {
        return Err(malformed("expected a top-level SEQUENCE"));
    }
    if !reader.is_empty() {
        return Err(malformed("trailing bytes after SEQUENCE"));
    }
    DerReader::new(outer.content).read_all()
}

fn malformed(msg: &str) -> NotificationError {
    NotificationError::CredentialFormat(msg.to_string())
}
