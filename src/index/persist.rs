//! Binary framing shared by the persisted store formats.
//!
//! Both store files carry a leading one-byte format version so a schema
//! change is detected at load time instead of producing garbage matches;
//! a mismatch tells the operator to rebuild the store.
//!
//! Strings are a u16 big-endian byte length followed by UTF-8. Matrices are
//! a generic frame:
//! rows (u32 BE), cols (u32 BE), element type (u8), raw elements in
//! row-major order, multi-byte elements big-endian.

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Element type tag for u8 matrices (descriptors)
pub(crate) const ELEM_U8: u8 = 0;
/// Element type tag for f32 matrices (keypoint coordinates)
pub(crate) const ELEM_F32: u8 = 1;

pub(crate) fn write_u8(w: &mut impl Write, value: u8) -> Result<()> {
    w.write_all(&[value])?;
    Ok(())
}

pub(crate) fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn write_u32(w: &mut impl Write, value: u32) -> Result<()> {
    w.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub(crate) fn write_u64(w: &mut impl Write, value: u64) -> Result<()> {
    w.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

pub(crate) fn write_str(w: &mut impl Write, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(Error::StoreCorrupt(format!(
            "identifier too long: {} bytes",
            bytes.len()
        )));
    }
    w.write_all(&(bytes.len() as u16).to_be_bytes())?;
    w.write_all(bytes)?;
    Ok(())
}

pub(crate) fn read_str(r: &mut impl Read) -> Result<String> {
    let mut len_buf = [0u8; 2];
    r.read_exact(&mut len_buf)?;
    let mut bytes = vec![0u8; u16::from_be_bytes(len_buf) as usize];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| Error::StoreCorrupt("identifier is not UTF-8".into()))
}

/// Verify the leading format version byte
pub(crate) fn check_version(r: &mut impl Read, expected: u8) -> Result<()> {
    let found = read_u8(r)?;
    if found != expected {
        return Err(Error::StoreVersion { found, expected });
    }
    Ok(())
}

pub(crate) fn write_matrix_u8(w: &mut impl Write, rows: usize, cols: usize, data: &[u8]) -> Result<()> {
    debug_assert_eq!(rows * cols, data.len());
    write_u32(w, rows as u32)?;
    write_u32(w, cols as u32)?;
    write_u8(w, ELEM_U8)?;
    w.write_all(data)?;
    Ok(())
}

pub(crate) fn read_matrix_u8(r: &mut impl Read) -> Result<(usize, usize, Vec<u8>)> {
    let rows = read_u32(r)? as usize;
    let cols = read_u32(r)? as usize;
    let elem = read_u8(r)?;
    if elem != ELEM_U8 {
        return Err(Error::StoreCorrupt(format!(
            "expected u8 matrix, found element type {}",
            elem
        )));
    }
    let mut data = vec![0u8; rows * cols];
    r.read_exact(&mut data)?;
    Ok((rows, cols, data))
}

pub(crate) fn write_matrix_f32(w: &mut impl Write, rows: usize, cols: usize, data: &[f32]) -> Result<()> {
    debug_assert_eq!(rows * cols, data.len());
    write_u32(w, rows as u32)?;
    write_u32(w, cols as u32)?;
    write_u8(w, ELEM_F32)?;
    for value in data {
        w.write_all(&value.to_be_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_matrix_f32(r: &mut impl Read) -> Result<(usize, usize, Vec<f32>)> {
    let rows = read_u32(r)? as usize;
    let cols = read_u32(r)? as usize;
    let elem = read_u8(r)?;
    if elem != ELEM_F32 {
        return Err(Error::StoreCorrupt(format!(
            "expected f32 matrix, found element type {}",
            elem
        )));
    }
    let mut data = Vec::with_capacity(rows * cols);
    let mut buf = [0u8; 4];
    for _ in 0..rows * cols {
        r.read_exact(&mut buf)?;
        data.push(f32::from_be_bytes(buf));
    }
    Ok((rows, cols, data))
}
