use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use erl_core::{Error, LabelId};
use ndarray::{Array2, ArrayD};
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement, WriteNpyError, WriteNpyExt};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NpyHeader {
    pub descr: String,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

/// Reads the header of an `.npy` file without touching the array data.
pub(crate) fn read_header(path: &Path) -> Result<NpyHeader, Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 6];
    reader
        .read_exact(&mut magic)
        .map_err(|e| Error::io(path, e))?;
    if &magic != MAGIC {
        return Err(Error::Format(format!(
            "not an .npy file: {}",
            path.display()
        )));
    }

    let mut version = [0u8; 2];
    reader
        .read_exact(&mut version)
        .map_err(|e| Error::io(path, e))?;

    // Header length field: 2 bytes in v1, 4 bytes in v2 and v3.
    let header_len = if version[0] == 1 {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
        u16::from_le_bytes(buf) as usize
    } else {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
        u32::from_le_bytes(buf) as usize
    };

    let mut header = vec![0u8; header_len];
    reader
        .read_exact(&mut header)
        .map_err(|e| Error::io(path, e))?;

    parse_header(&String::from_utf8_lossy(&header))
        .map_err(|msg| Error::Format(format!("{}: {msg}", path.display())))
}

// Example: "{'descr': '<u8', 'fortran_order': False, 'shape': (64, 64), }"
fn parse_header(text: &str) -> Result<NpyHeader, String> {
    let descr = quoted_value(text, "'descr':").ok_or("missing 'descr' in header")?;

    let fortran_order = text
        .find("'fortran_order':")
        .map(|i| text[i + "'fortran_order':".len()..].trim_start().starts_with("True"))
        .ok_or("missing 'fortran_order' in header")?;

    let start = text.find("'shape':").ok_or("missing 'shape' in header")?;
    let rest = &text[start + "'shape':".len()..];
    let open = rest.find('(').ok_or("malformed shape tuple")?;
    let close = rest.find(')').ok_or("malformed shape tuple")?;
    if close < open {
        return Err("malformed shape tuple".into());
    }
    let shape = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("bad dimension '{s}'")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NpyHeader {
        descr,
        fortran_order,
        shape,
    })
}

fn quoted_value(text: &str, key: &str) -> Option<String> {
    let rest = &text[text.find(key)? + key.len()..];
    let open = rest.find('\'')?;
    let tail = &rest[open + 1..];
    let close = tail.find('\'')?;
    Some(tail[..close].to_string())
}

/// Type code without the byte-order marker, e.g. `"u4"`.
fn type_code(descr: &str) -> &str {
    descr.trim_start_matches(['<', '>', '|', '='])
}

/// Loads a 2-D plane as `((height, width), labels)` in row-major order.
pub(crate) fn read_plane(path: &Path) -> Result<((usize, usize), Vec<LabelId>), Error> {
    let header = read_header(path)?;
    let &[height, width] = header.shape.as_slice() else {
        return Err(Error::Format(format!(
            "expected a 2-D slice in {}, got shape {:?}",
            path.display(),
            header.shape
        )));
    };

    let labels = match type_code(&header.descr) {
        "u1" => widen(read_array::<u8>(path)?, path)?,
        "u2" => widen(read_array::<u16>(path)?, path)?,
        "u4" => widen(read_array::<u32>(path)?, path)?,
        "u8" => widen(read_array::<u64>(path)?, path)?,
        "i1" => widen(read_array::<i8>(path)?, path)?,
        "i2" => widen(read_array::<i16>(path)?, path)?,
        "i4" => widen(read_array::<i32>(path)?, path)?,
        "i8" => widen(read_array::<i64>(path)?, path)?,
        "b1" => read_array::<bool>(path)?
            .iter()
            .map(|&b| LabelId::from(b))
            .collect(),
        other => {
            return Err(Error::Format(format!(
                "unsupported label dtype '{other}' in {}",
                path.display()
            )));
        }
    };

    Ok(((height, width), labels))
}

fn read_array<T: ReadableElement>(path: &Path) -> Result<ArrayD<T>, Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    ArrayD::<T>::read_npy(BufReader::new(file)).map_err(|e| match e {
        ReadNpyError::Io(source) => Error::io(path, source),
        other => Error::Format(format!("npy read error at {}: {other}", path.display())),
    })
}

// Iteration is in logical order, so Fortran-ordered files come out row-major.
fn widen<T>(arr: ArrayD<T>, path: &Path) -> Result<Vec<LabelId>, Error>
where
    T: Copy + TryInto<LabelId> + std::fmt::Display,
{
    arr.iter()
        .map(|&v| {
            v.try_into().map_err(|_| {
                Error::Format(format!("negative label {v} in {}", path.display()))
            })
        })
        .collect()
}

pub(crate) fn write_plane(path: &Path, plane: Array2<LabelId>) -> Result<(), Error> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    plane.write_npy(BufWriter::new(file)).map_err(|e| match e {
        WriteNpyError::Io(source) => Error::io(path, source),
        other => Error::Format(format!("npy write error at {}: {other}", path.display())),
    })
}
