use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::constant_pool::ConstantPool;
use crate::reader::ByteReader;

const CLASS_MAGIC: u32 = 0xCAFEBABE;

/// Parsed class file with attribute payloads left undecoded.
#[derive(Clone, Debug)]
pub(crate) struct ClassFile {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access_flags: u16,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) interfaces: Vec<u16>,
    pub(crate) fields: Vec<MemberInfo>,
    pub(crate) methods: Vec<MemberInfo>,
    pub(crate) attributes: Vec<RawAttribute>,
}

/// Field or method table entry.
#[derive(Clone, Debug)]
pub(crate) struct MemberInfo {
    pub(crate) access_flags: u16,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<RawAttribute>,
}

/// Attribute name index plus its raw payload.
#[derive(Clone, Debug)]
pub(crate) struct RawAttribute {
    pub(crate) name_index: u16,
    pub(crate) info: Vec<u8>,
}

/// Decoded `Code` attribute; only the nested attributes are kept.
#[derive(Clone, Debug)]
pub(crate) struct CodeAttribute {
    pub(crate) attributes: Vec<RawAttribute>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LineNumber {
    pub(crate) start_pc: u16,
    pub(crate) line: u16,
}

/// `LocalVariableTable` entry with its name resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LocalVariable {
    pub(crate) start_pc: u16,
    pub(crate) name: String,
    pub(crate) index: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct InnerClassEntry {
    pub(crate) inner_class_index: u16,
    pub(crate) outer_class_index: u16,
    pub(crate) access_flags: u16,
}

impl ClassFile {
    pub(crate) fn read(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let magic = reader.read_u32().context("read magic")?;
        if magic != CLASS_MAGIC {
            anyhow::bail!("invalid class file magic: 0x{magic:08X}");
        }
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;
        let constant_pool = ConstantPool::parse(&mut reader).context("parse constant pool")?;
        let access_flags = reader.read_u16()?;
        let this_class = reader.read_u16()?;
        let super_class = reader.read_u16()?;

        let interface_count = reader.read_u16()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            interfaces.push(reader.read_u16()?);
        }

        let fields = parse_members(&mut reader).context("parse fields")?;
        let methods = parse_members(&mut reader).context("parse methods")?;
        let attributes = parse_attributes(&mut reader).context("parse class attributes")?;

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}

fn parse_members(reader: &mut ByteReader<'_>) -> Result<Vec<MemberInfo>> {
    let count = reader.read_u16()? as usize;
    let mut members = Vec::with_capacity(count);
    for index in 0..count {
        let access_flags = reader.read_u16()?;
        let name_index = reader.read_u16()?;
        let descriptor_index = reader.read_u16()?;
        let attributes = parse_attributes(reader)
            .with_context(|| format!("parse attributes of member {index}"))?;
        members.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

pub(crate) fn parse_attributes(reader: &mut ByteReader<'_>) -> Result<Vec<RawAttribute>> {
    let count = reader.read_u16()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let name_index = reader.read_u16()?;
        let len = reader.read_u32()? as usize;
        let start = reader.offset();
        let info = reader
            .read_bytes(len)
            .with_context(|| format!("read attribute payload at offset {start}"))?
            .to_vec();
        attributes.push(RawAttribute { name_index, info });
    }
    Ok(attributes)
}

/// `SourceFile` and `ConstantValue` payloads are a single u2 index.
pub(crate) fn single_index(info: &[u8]) -> Result<u16> {
    ByteReader::new(info).read_u16()
}

impl CodeAttribute {
    pub(crate) fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(info);
        reader.skip(4).context("skip max_stack and max_locals")?;
        let code_length = reader.read_u32()? as usize;
        reader.skip(code_length).context("skip bytecode")?;
        let exception_count = reader.read_u16()? as usize;
        reader
            .skip(exception_count * 8)
            .context("skip exception table")?;
        let attributes = parse_attributes(&mut reader).context("parse code attributes")?;
        Ok(Self { attributes })
    }
}

pub(crate) fn parse_line_numbers(info: &[u8]) -> Result<Vec<LineNumber>> {
    let mut reader = ByteReader::new(info);
    let count = reader.read_u16()? as usize;
    let mut lines = Vec::with_capacity(count);
    for _ in 0..count {
        lines.push(LineNumber {
            start_pc: reader.read_u16()?,
            line: reader.read_u16()?,
        });
    }
    Ok(lines)
}

pub(crate) fn parse_local_variables(
    info: &[u8],
    constant_pool: &ConstantPool,
) -> Result<Vec<LocalVariable>> {
    let mut reader = ByteReader::new(info);
    let count = reader.read_u16()? as usize;
    let mut variables = Vec::with_capacity(count);
    for _ in 0..count {
        let start_pc = reader.read_u16()?;
        let _length = reader.read_u16()?;
        let name_index = reader.read_u16()?;
        let _descriptor_index = reader.read_u16()?;
        let index = reader.read_u16()?;
        variables.push(LocalVariable {
            start_pc,
            name: constant_pool.resolve_string(name_index).unwrap_or_default(),
            index,
        });
    }
    Ok(variables)
}

pub(crate) fn parse_inner_classes(info: &[u8]) -> Result<Vec<InnerClassEntry>> {
    let mut reader = ByteReader::new(info);
    let count = reader.read_u16()? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let inner_class_index = reader.read_u16()?;
        let outer_class_index = reader.read_u16()?;
        let _inner_name_index = reader.read_u16()?;
        let access_flags = reader.read_u16()?;
        entries.push(InnerClassEntry {
            inner_class_index,
            outer_class_index,
            access_flags,
        });
    }
    Ok(entries)
}
