//! Builders for raw class-file fragments used across unit tests.

use crate::classfile::tag;

// Helper to assemble a constant pool section byte by byte
pub struct PoolBuilder {
    count: u16,
    bytes: Vec<u8>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        PoolBuilder {
            count: 1,
            bytes: Vec::new(),
        }
    }

    fn entry(mut self, entry_tag: u8, payload: &[u8], slots: u16) -> Self {
        self.bytes.push(entry_tag);
        self.bytes.extend_from_slice(payload);
        self.count += slots;
        self
    }

    pub fn utf8(self, value: &str) -> Self {
        let mut payload = (value.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(value.as_bytes());
        self.entry(tag::UTF8, &payload, 1)
    }

    pub fn integer(self, value: i32) -> Self {
        self.entry(tag::INTEGER, &value.to_be_bytes(), 1)
    }

    pub fn long(self, value: i64) -> Self {
        self.entry(tag::LONG, &value.to_be_bytes(), 2)
    }

    pub fn class(self, name: u16) -> Self {
        self.entry(tag::CLASS, &name.to_be_bytes(), 1)
    }

    pub fn string(self, value: u16) -> Self {
        self.entry(tag::STRING, &value.to_be_bytes(), 1)
    }

    pub fn name_and_type(self, name: u16, descriptor: u16) -> Self {
        self.entry(tag::NAME_AND_TYPE, &pair(name, descriptor), 1)
    }

    pub fn method_ref(self, class: u16, name_and_type: u16) -> Self {
        self.entry(tag::METHOD_REF, &pair(class, name_and_type), 1)
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = self.count.to_be_bytes().to_vec();
        out.extend_from_slice(&self.bytes);
        out
    }
}

fn pair(first: u16, second: u16) -> [u8; 4] {
    let [a, b] = first.to_be_bytes();
    let [c, d] = second.to_be_bytes();
    [a, b, c, d]
}

// Helper to assemble a Code attribute body
pub struct CodeBuilder {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    handlers: Vec<[u16; 4]>,
    attributes: Vec<(u16, Vec<u8>)>,
}

impl CodeBuilder {
    pub fn new(max_stack: u16, max_locals: u16, code: &[u8]) -> Self {
        CodeBuilder {
            max_stack,
            max_locals,
            code: code.to_vec(),
            handlers: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn handler(mut self, start: u16, end: u16, handler: u16, catch_type: u16) -> Self {
        self.handlers.push([start, end, handler, catch_type]);
        self
    }

    pub fn line_numbers(self, name_index: u16, entries: &[(u16, u16)]) -> Self {
        let mut body = (entries.len() as u16).to_be_bytes().to_vec();
        for (start_pc, line) in entries {
            body.extend_from_slice(&pair(*start_pc, *line));
        }
        self.raw_attribute(name_index, &body)
    }

    pub fn local_variables(self, name_index: u16, entries: &[(u16, u16, u16, u16, u16)]) -> Self {
        let mut body = (entries.len() as u16).to_be_bytes().to_vec();
        for (start_pc, length, name, descriptor, index) in entries {
            body.extend_from_slice(&pair(*start_pc, *length));
            body.extend_from_slice(&pair(*name, *descriptor));
            body.extend_from_slice(&index.to_be_bytes());
        }
        self.raw_attribute(name_index, &body)
    }

    pub fn stack_map(self, name_index: u16, frame_count: u16, frames: &[u8]) -> Self {
        let mut body = frame_count.to_be_bytes().to_vec();
        body.extend_from_slice(frames);
        self.raw_attribute(name_index, &body)
    }

    pub fn raw_attribute(mut self, name_index: u16, body: &[u8]) -> Self {
        self.attributes.push((name_index, body.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.max_stack.to_be_bytes());
        out.extend_from_slice(&self.max_locals.to_be_bytes());
        out.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.code);

        out.extend_from_slice(&(self.handlers.len() as u16).to_be_bytes());
        for handler in &self.handlers {
            for value in handler {
                out.extend_from_slice(&value.to_be_bytes());
            }
        }

        out.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for (name_index, body) in &self.attributes {
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(body);
        }
        out
    }
}
