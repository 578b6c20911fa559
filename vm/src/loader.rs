//! Reader and writer for `.clnu` bytecode containers.
//!
//! Layout (all integers little-endian `u32`):
//!
//! ```text
//! header        "CLNU" version "CLVM" platform_version section_header_offset
//! section hdr   count, offset[count]            -> section info entries
//! section info  name_len(=4) name[4] offset size
//! .dat          count, item_offset[count], items {id, type, size, payload (4-aligned)}
//! .txt          count, {opcode, operand}[count]
//! .exp          count, {name_id, args_count, arg_id[args_count]}[count]
//! ```
//!
//! Data item offsets are relative to the start of the `.dat` section.

use crate::error::LoaderError;
use crate::module::{
    DataValue, ExportItem, Module, DATA_TYPE_IDENTIFIER, DATA_TYPE_INT, DATA_TYPE_NONE,
    DATA_TYPE_STRING,
};
use crate::opcode::Instrument;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

pub const MAGIC: &[u8; 4] = b"CLNU";
pub const FORMAT_VERSION: u32 = 1;
pub const PLATFORM: &[u8; 4] = b"CLVM";
pub const PLATFORM_VERSION: u32 = 1;
pub const HEADER_SIZE: u32 = 20;
const SECTION_INFO_SIZE: u32 = 16;

pub const SECTION_DATA: &[u8; 4] = b".dat";
pub const SECTION_TEXT: &[u8; 4] = b".txt";
pub const SECTION_EXPORT: &[u8; 4] = b".exp";

// Allocation bomb limits
const MAX_SECTIONS: u32 = 16;
const MAX_DATA_ITEMS: u32 = 1_000_000;
const MAX_ITEM_SIZE: u32 = 16 * 1024 * 1024;
const MAX_INSTRUMENTS: u32 = 16_000_000;
const MAX_EXPORTS: u32 = 100_000;
const MAX_EXPORT_ARGS: u32 = 1024;

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

// ======================================================================
// Reading
// ======================================================================

/// Read a whole container from `reader` and decode it into a module named
/// `name`.
pub fn read_module<R: Read>(name: &str, reader: &mut R) -> Result<Module, LoaderError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_module(name, &bytes)
}

pub fn decode_module(name: &str, bytes: &[u8]) -> Result<Module, LoaderError> {
    let mut cur = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cur.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(LoaderError::Format("invalid magic".to_string()));
    }
    let version = cur.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(LoaderError::Format(format!("unsupported format version {}", version)));
    }
    let mut platform = [0u8; 4];
    cur.read_exact(&mut platform)?;
    if &platform != PLATFORM {
        return Err(LoaderError::Format("invalid platform tag".to_string()));
    }
    let platform_version = cur.read_u32::<LittleEndian>()?;
    if platform_version != PLATFORM_VERSION {
        return Err(LoaderError::Format(format!(
            "unsupported platform version {}",
            platform_version
        )));
    }
    let section_header = cur.read_u32::<LittleEndian>()?;

    // --- Section Header ---
    cur.set_position(section_header as u64);
    let count = cur.read_u32::<LittleEndian>()?;
    if count > MAX_SECTIONS {
        return Err(LoaderError::Security(format!("section count too large: {}", count)));
    }
    let mut info_offsets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        info_offsets.push(cur.read_u32::<LittleEndian>()?);
    }

    let mut module = Module::new(name);
    let mut seen = Vec::new();
    for info in info_offsets {
        cur.set_position(info as u64);
        let name_len = cur.read_u32::<LittleEndian>()?;
        if name_len != 4 {
            return Err(LoaderError::Format(format!("section name length {}", name_len)));
        }
        let mut section_name = [0u8; 4];
        cur.read_exact(&mut section_name)?;
        let offset = cur.read_u32::<LittleEndian>()? as usize;
        let size = cur.read_u32::<LittleEndian>()? as usize;
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| LoaderError::Format("section out of range".to_string()))?;
        if seen.contains(&section_name) {
            return Err(LoaderError::Format("duplicate section".to_string()));
        }
        seen.push(section_name);

        let body = &bytes[offset..end];
        match &section_name {
            SECTION_DATA => module.data = decode_data(body)?,
            SECTION_TEXT => module.text = decode_text(body)?,
            SECTION_EXPORT => module.exports = decode_exports(body)?,
            other => {
                return Err(LoaderError::Format(format!(
                    "unknown section {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        }
    }

    for export in &module.exports {
        for id in std::iter::once(&export.name_id).chain(export.args.iter()) {
            if module.data_text(*id).is_none() {
                return Err(LoaderError::Format(format!(
                    "export references missing name item {}",
                    id
                )));
            }
        }
    }

    Ok(module)
}

fn decode_data(body: &[u8]) -> Result<BTreeMap<u32, DataValue>, LoaderError> {
    let mut cur = Cursor::new(body);
    let count = cur.read_u32::<LittleEndian>()?;
    if count > MAX_DATA_ITEMS {
        return Err(LoaderError::Security(format!("data item count too large: {}", count)));
    }
    let mut offsets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        offsets.push(cur.read_u32::<LittleEndian>()?);
    }

    let mut items = BTreeMap::new();
    for offset in offsets {
        cur.set_position(offset as u64);
        let id = cur.read_u32::<LittleEndian>()?;
        let ty = cur.read_u32::<LittleEndian>()?;
        let size = cur.read_u32::<LittleEndian>()?;
        if size > MAX_ITEM_SIZE {
            return Err(LoaderError::Security(format!("data item {} too large: {}", id, size)));
        }
        let mut payload = vec![0u8; size as usize];
        cur.read_exact(&mut payload)?;

        let value = match ty {
            DATA_TYPE_INT => {
                if size != 8 {
                    return Err(LoaderError::Format(format!("int item {} has size {}", id, size)));
                }
                DataValue::Int(Cursor::new(&payload).read_i64::<LittleEndian>()?)
            }
            DATA_TYPE_STRING | DATA_TYPE_IDENTIFIER => {
                let s = String::from_utf8(payload)
                    .map_err(|_| LoaderError::Format(format!("invalid UTF-8 in item {}", id)))?;
                if ty == DATA_TYPE_STRING {
                    DataValue::Str(s)
                } else {
                    DataValue::Ident(s)
                }
            }
            DATA_TYPE_NONE => DataValue::None,
            _ => return Err(LoaderError::Format(format!("unknown data type {}", ty))),
        };
        if items.insert(id, value).is_some() {
            return Err(LoaderError::Format(format!("duplicate data id {}", id)));
        }
    }
    Ok(items)
}

/// Decode a `.txt` section body.
pub fn decode_text(body: &[u8]) -> Result<Vec<Instrument>, LoaderError> {
    let mut cur = Cursor::new(body);
    let count = cur.read_u32::<LittleEndian>()?;
    if count > MAX_INSTRUMENTS {
        return Err(LoaderError::Security(format!("instrument count too large: {}", count)));
    }
    if (body.len() as u64) < 4 + count as u64 * 8 {
        return Err(LoaderError::Format("truncated text section".to_string()));
    }
    let mut text = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let opcode = cur.read_u32::<LittleEndian>()?;
        let operand = cur.read_u32::<LittleEndian>()?;
        text.push(Instrument { opcode, operand });
    }
    Ok(text)
}

fn decode_exports(body: &[u8]) -> Result<Vec<ExportItem>, LoaderError> {
    let mut cur = Cursor::new(body);
    let count = cur.read_u32::<LittleEndian>()?;
    if count > MAX_EXPORTS {
        return Err(LoaderError::Security(format!("export count too large: {}", count)));
    }
    let mut exports = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_id = cur.read_u32::<LittleEndian>()?;
        let args_count = cur.read_u32::<LittleEndian>()?;
        if args_count > MAX_EXPORT_ARGS {
            return Err(LoaderError::Security(format!("too many export args: {}", args_count)));
        }
        let mut args = Vec::with_capacity(args_count as usize);
        for _ in 0..args_count {
            args.push(cur.read_u32::<LittleEndian>()?);
        }
        exports.push(ExportItem { name_id, args });
    }
    Ok(exports)
}

// ======================================================================
// Writing
// ======================================================================

pub fn write_module<W: Write>(module: &Module, writer: &mut W) -> Result<(), LoaderError> {
    writer.write_all(&encode_module(module)?)?;
    Ok(())
}

pub fn encode_module(module: &Module) -> Result<Vec<u8>, LoaderError> {
    let sections: [(&[u8; 4], Vec<u8>); 3] = [
        (SECTION_DATA, encode_data(module)?),
        (SECTION_TEXT, encode_text(&module.text)?),
        (SECTION_EXPORT, encode_exports(module)?),
    ];

    let count = sections.len() as u32;
    let infos_start = HEADER_SIZE + 4 + 4 * count;
    let mut body_offset = infos_start + SECTION_INFO_SIZE * count;

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    out.extend_from_slice(PLATFORM);
    out.write_u32::<LittleEndian>(PLATFORM_VERSION)?;
    out.write_u32::<LittleEndian>(HEADER_SIZE)?;

    out.write_u32::<LittleEndian>(count)?;
    for i in 0..count {
        out.write_u32::<LittleEndian>(infos_start + SECTION_INFO_SIZE * i)?;
    }
    for (name, body) in &sections {
        out.write_u32::<LittleEndian>(4)?;
        out.extend_from_slice(*name);
        out.write_u32::<LittleEndian>(body_offset)?;
        out.write_u32::<LittleEndian>(body.len() as u32)?;
        body_offset += body.len() as u32;
    }
    for (_, body) in &sections {
        out.extend_from_slice(body);
    }
    Ok(out)
}

fn encode_data(module: &Module) -> Result<Vec<u8>, LoaderError> {
    let mut items = Vec::with_capacity(module.data.len());
    for (id, value) in &module.data {
        let payload = match value {
            DataValue::Int(n) => n.to_le_bytes().to_vec(),
            DataValue::Str(s) | DataValue::Ident(s) => s.as_bytes().to_vec(),
            DataValue::None => Vec::new(),
        };
        let mut item = Vec::with_capacity(12 + padded(payload.len()));
        item.write_u32::<LittleEndian>(*id)?;
        item.write_u32::<LittleEndian>(value.type_tag())?;
        item.write_u32::<LittleEndian>(payload.len() as u32)?;
        item.extend_from_slice(&payload);
        item.resize(12 + padded(payload.len()), 0);
        items.push(item);
    }

    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(items.len() as u32)?;
    let mut offset = 4 + 4 * items.len() as u32;
    for item in &items {
        out.write_u32::<LittleEndian>(offset)?;
        offset += item.len() as u32;
    }
    for item in items {
        out.extend_from_slice(&item);
    }
    Ok(out)
}

/// Encode a `.txt` section body.
pub fn encode_text(text: &[Instrument]) -> Result<Vec<u8>, LoaderError> {
    let mut out = Vec::with_capacity(4 + text.len() * 8);
    out.write_u32::<LittleEndian>(text.len() as u32)?;
    for ins in text {
        out.write_u32::<LittleEndian>(ins.opcode)?;
        out.write_u32::<LittleEndian>(ins.operand)?;
    }
    Ok(out)
}

fn encode_exports(module: &Module) -> Result<Vec<u8>, LoaderError> {
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(module.exports.len() as u32)?;
    for export in &module.exports {
        out.write_u32::<LittleEndian>(export.name_id)?;
        out.write_u32::<LittleEndian>(export.args.len() as u32)?;
        for arg in &export.args {
            out.write_u32::<LittleEndian>(*arg)?;
        }
    }
    Ok(out)
}
