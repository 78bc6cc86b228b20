//! Minimal class file writer for unit tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Constant that can be attached to a field through `ConstantValue`.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TestConstant<'a> {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(&'a str),
}

/// Method definition for generated class files.
#[derive(Clone, Debug)]
pub(crate) struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    has_code: bool,
    line_numbers: Option<Vec<(u16, u16)>>,
    local_variables: Option<Vec<(u16, String, String, u16)>>,
}

impl MethodSpec {
    pub(crate) fn new(access: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            has_code: true,
            line_numbers: None,
            local_variables: None,
        }
    }

    pub(crate) fn without_code(mut self) -> Self {
        self.has_code = false;
        self
    }

    pub(crate) fn line_numbers(mut self, lines: &[(u16, u16)]) -> Self {
        self.line_numbers = Some(lines.to_vec());
        self
    }

    /// Entries are `(start_pc, name, descriptor, slot)`.
    pub(crate) fn local_variables(mut self, locals: &[(u16, &str, &str, u16)]) -> Self {
        self.local_variables = Some(
            locals
                .iter()
                .map(|(pc, name, descriptor, slot)| {
                    (*pc, name.to_string(), descriptor.to_string(), *slot)
                })
                .collect(),
        );
        self
    }
}

#[derive(Clone, Debug)]
struct FieldSpec {
    access: u16,
    name: String,
    descriptor: String,
    constant: Option<CpConstant>,
}

#[derive(Clone, Debug)]
struct InnerSpec {
    inner: String,
    outer: Option<String>,
    simple_name: Option<String>,
    access: u16,
}

#[derive(Clone, Debug)]
enum CpConstant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

/// Constant pool entries needed by generated class files.
enum CpEntry {
    Utf8(String),
    Class(u16),
    String(u16),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
}

impl CpEntry {
    fn write(&self, bytes: &mut Vec<u8>) {
        match self {
            CpEntry::Utf8(value) => {
                bytes.push(1);
                write_u16(bytes, value.len() as u16);
                bytes.extend_from_slice(value.as_bytes());
            }
            CpEntry::Integer(bits) => {
                bytes.push(3);
                write_u32(bytes, *bits);
            }
            CpEntry::Float(bits) => {
                bytes.push(4);
                write_u32(bytes, *bits);
            }
            CpEntry::Long(bits) => {
                bytes.push(5);
                bytes.extend_from_slice(&bits.to_be_bytes());
            }
            CpEntry::Double(bits) => {
                bytes.push(6);
                bytes.extend_from_slice(&bits.to_be_bytes());
            }
            CpEntry::Class(name_index) => {
                bytes.push(7);
                write_u16(bytes, *name_index);
            }
            CpEntry::String(utf8_index) => {
                bytes.push(8);
                write_u16(bytes, *utf8_index);
            }
        }
    }

    fn slots(&self) -> u16 {
        match self {
            CpEntry::Long(_) | CpEntry::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Builds class files byte by byte.
pub(crate) struct ClassFileBuilder {
    cp: Vec<CpEntry>,
    next_index: u16,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    source_file: Option<String>,
    inner_classes: Vec<InnerSpec>,
}

impl ClassFileBuilder {
    pub(crate) fn new(class_name: &str, super_name: &str) -> Self {
        let mut builder = Self {
            cp: Vec::new(),
            next_index: 1,
            access: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
            inner_classes: Vec::new(),
        };
        builder.this_class = builder.add_class(class_name);
        builder.super_class = builder.add_class(super_name);
        builder
    }

    pub(crate) fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub(crate) fn add_interface(&mut self, name: &str) {
        let index = self.add_class(name);
        self.interfaces.push(index);
    }

    pub(crate) fn add_field(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        constant: Option<TestConstant<'_>>,
    ) {
        let constant = constant.map(|value| match value {
            TestConstant::Int(v) => CpConstant::Int(v),
            TestConstant::Long(v) => CpConstant::Long(v),
            TestConstant::Float(v) => CpConstant::Float(v),
            TestConstant::Double(v) => CpConstant::Double(v),
            TestConstant::Str(v) => CpConstant::Str(v.to_string()),
        });
        self.fields.push(FieldSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            constant,
        });
    }

    pub(crate) fn add_method(&mut self, method: MethodSpec) {
        self.methods.push(method);
    }

    pub(crate) fn source_file(&mut self, name: &str) {
        self.source_file = Some(name.to_string());
    }

    pub(crate) fn add_inner_class(
        &mut self,
        inner: &str,
        outer: Option<&str>,
        simple_name: Option<&str>,
        access: u16,
    ) {
        self.inner_classes.push(InnerSpec {
            inner: inner.to_string(),
            outer: outer.map(str::to_string),
            simple_name: simple_name.map(str::to_string),
            access,
        });
    }

    fn push(&mut self, entry: CpEntry) -> u16 {
        let index = self.next_index;
        self.next_index += entry.slots();
        self.cp.push(entry);
        index
    }

    fn add_utf8(&mut self, value: &str) -> u16 {
        self.push(CpEntry::Utf8(value.to_string()))
    }

    fn add_class(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.push(CpEntry::Class(name_index))
    }

    fn add_constant(&mut self, constant: &CpConstant) -> u16 {
        match constant {
            CpConstant::Int(v) => self.push(CpEntry::Integer(*v as u32)),
            CpConstant::Long(v) => self.push(CpEntry::Long(*v as u64)),
            CpConstant::Float(v) => self.push(CpEntry::Float(v.to_bits())),
            CpConstant::Double(v) => self.push(CpEntry::Double(v.to_bits())),
            CpConstant::Str(v) => {
                let utf8 = self.add_utf8(v);
                self.push(CpEntry::String(utf8))
            }
        }
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        let fields = std::mem::take(&mut self.fields);
        let methods = std::mem::take(&mut self.methods);
        let inner_classes = std::mem::take(&mut self.inner_classes);

        let mut field_bytes = Vec::new();
        write_u16(&mut field_bytes, fields.len() as u16);
        for field in &fields {
            let name_index = self.add_utf8(&field.name);
            let descriptor_index = self.add_utf8(&field.descriptor);
            write_u16(&mut field_bytes, field.access);
            write_u16(&mut field_bytes, name_index);
            write_u16(&mut field_bytes, descriptor_index);
            match &field.constant {
                Some(constant) => {
                    let attr_name = self.add_utf8("ConstantValue");
                    let value_index = self.add_constant(constant);
                    write_u16(&mut field_bytes, 1);
                    write_u16(&mut field_bytes, attr_name);
                    write_u32(&mut field_bytes, 2);
                    write_u16(&mut field_bytes, value_index);
                }
                None => write_u16(&mut field_bytes, 0),
            }
        }

        let mut method_bytes = Vec::new();
        write_u16(&mut method_bytes, methods.len() as u16);
        for method in &methods {
            let name_index = self.add_utf8(&method.name);
            let descriptor_index = self.add_utf8(&method.descriptor);
            write_u16(&mut method_bytes, method.access);
            write_u16(&mut method_bytes, name_index);
            write_u16(&mut method_bytes, descriptor_index);
            if !method.has_code {
                write_u16(&mut method_bytes, 0);
                continue;
            }
            let code = self.code_attribute(method);
            write_u16(&mut method_bytes, 1);
            method_bytes.extend_from_slice(&code);
        }

        let mut class_attributes = Vec::new();
        let mut class_attribute_count = 0u16;
        if let Some(source_file) = self.source_file.clone() {
            let attr_name = self.add_utf8("SourceFile");
            let value_index = self.add_utf8(&source_file);
            write_u16(&mut class_attributes, attr_name);
            write_u32(&mut class_attributes, 2);
            write_u16(&mut class_attributes, value_index);
            class_attribute_count += 1;
        }
        if !inner_classes.is_empty() {
            let attr_name = self.add_utf8("InnerClasses");
            let mut payload = Vec::new();
            write_u16(&mut payload, inner_classes.len() as u16);
            for inner in &inner_classes {
                let inner_index = if inner.inner == self.class_name(self.this_class) {
                    self.this_class
                } else {
                    self.add_class(&inner.inner)
                };
                let outer_index = match &inner.outer {
                    Some(outer) => self.add_class(outer),
                    None => 0,
                };
                let name_index = match &inner.simple_name {
                    Some(name) => self.add_utf8(name),
                    None => 0,
                };
                write_u16(&mut payload, inner_index);
                write_u16(&mut payload, outer_index);
                write_u16(&mut payload, name_index);
                write_u16(&mut payload, inner.access);
            }
            write_u16(&mut class_attributes, attr_name);
            write_u32(&mut class_attributes, payload.len() as u32);
            class_attributes.extend_from_slice(&payload);
            class_attribute_count += 1;
        }

        let mut bytes = Vec::new();
        write_u32(&mut bytes, 0xCAFEBABE);
        write_u16(&mut bytes, 0);
        write_u16(&mut bytes, 52);
        write_u16(&mut bytes, self.next_index);
        for entry in &self.cp {
            entry.write(&mut bytes);
        }
        write_u16(&mut bytes, self.access);
        write_u16(&mut bytes, self.this_class);
        write_u16(&mut bytes, self.super_class);
        write_u16(&mut bytes, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            write_u16(&mut bytes, *interface);
        }
        bytes.extend_from_slice(&field_bytes);
        bytes.extend_from_slice(&method_bytes);
        write_u16(&mut bytes, class_attribute_count);
        bytes.extend_from_slice(&class_attributes);
        bytes
    }

    /// Full `Code` attribute (name index, length, payload) with a single `return`.
    fn code_attribute(&mut self, method: &MethodSpec) -> Vec<u8> {
        let code_name = self.add_utf8("Code");
        let mut nested = Vec::new();
        let mut nested_count = 0u16;
        if let Some(lines) = &method.line_numbers {
            let attr_name = self.add_utf8("LineNumberTable");
            write_u16(&mut nested, attr_name);
            write_u32(&mut nested, 2 + 4 * lines.len() as u32);
            write_u16(&mut nested, lines.len() as u16);
            for (pc, line) in lines {
                write_u16(&mut nested, *pc);
                write_u16(&mut nested, *line);
            }
            nested_count += 1;
        }
        let mut max_locals = 1u16;
        if let Some(locals) = &method.local_variables {
            let attr_name = self.add_utf8("LocalVariableTable");
            write_u16(&mut nested, attr_name);
            write_u32(&mut nested, 2 + 10 * locals.len() as u32);
            write_u16(&mut nested, locals.len() as u16);
            for (pc, name, descriptor, slot) in locals {
                let name_index = self.add_utf8(name);
                let descriptor_index = self.add_utf8(descriptor);
                write_u16(&mut nested, *pc);
                write_u16(&mut nested, 1);
                write_u16(&mut nested, name_index);
                write_u16(&mut nested, descriptor_index);
                write_u16(&mut nested, *slot);
                max_locals = max_locals.max(slot + 1);
            }
            nested_count += 1;
        }

        let code = [0xb1u8];
        let mut payload = Vec::new();
        write_u16(&mut payload, 1);
        write_u16(&mut payload, max_locals);
        write_u32(&mut payload, code.len() as u32);
        payload.extend_from_slice(&code);
        write_u16(&mut payload, 0);
        write_u16(&mut payload, nested_count);
        payload.extend_from_slice(&nested);

        let mut bytes = Vec::new();
        write_u16(&mut bytes, code_name);
        write_u32(&mut bytes, payload.len() as u32);
        bytes.extend_from_slice(&payload);
        bytes
    }

    fn class_name(&self, class_index: u16) -> String {
        let mut index = 1u16;
        let mut name_index = None;
        for entry in &self.cp {
            if index == class_index {
                if let CpEntry::Class(utf8) = entry {
                    name_index = Some(*utf8);
                }
            }
            index += entry.slots();
        }
        let Some(name_index) = name_index else {
            return String::new();
        };
        let mut index = 1u16;
        for entry in &self.cp {
            if index == name_index {
                if let CpEntry::Utf8(value) = entry {
                    return value.clone();
                }
            }
            index += entry.slots();
        }
        String::new()
    }
}

/// Writes `bytes` to `root/relative`, creating parent directories.
pub(crate) fn write_file(root: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(&path, bytes).expect("write fixture file");
    path
}

fn write_u16(bytes: &mut Vec<u8>, value: u16) {
    bytes.extend_from_slice(&value.to_be_bytes());
}

fn write_u32(bytes: &mut Vec<u8>, value: u32) {
    bytes.extend_from_slice(&value.to_be_bytes());
}
