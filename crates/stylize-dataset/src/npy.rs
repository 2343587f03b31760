//! Minimal writer for 1D little endian f32 `.npy` files (format version 1.0).

use std::io::{self, Write};
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";
// numpy pads the header so the data starts on a 64 byte boundary.
const ALIGN: usize = 64;

fn header(len: usize) -> Vec<u8> {
    let dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({len},), }}");
    // magic + version + header length field.
    let prefix = MAGIC.len() + 2 + 2;
    let unpadded = prefix + dict.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;

    let mut header = dict.into_bytes();
    header.extend(std::iter::repeat_n(b' ', padding));
    header.push(b'\n');
    header
}

pub fn write_npy<W: Write>(mut writer: W, values: &[f32]) -> io::Result<()> {
    let header = header(values.len());
    let header_len = u16::try_from(header.len())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(&header)?;
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()
}

pub fn save_npy(path: &Path, values: &[f32]) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_npy(io::BufWriter::new(file), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_npy<R: Read>(mut reader: R) -> io::Result<Vec<f32>> {
        let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_owned());

        let mut preamble = [0u8; 10];
        reader.read_exact(&mut preamble)?;
        if &preamble[..6] != MAGIC || preamble[6] != 1 {
            return Err(invalid("Not a version 1 npy file"));
        }
        let header_len = u16::from_le_bytes([preamble[8], preamble[9]]) as usize;

        let mut header = vec![0u8; header_len];
        reader.read_exact(&mut header)?;
        let header = String::from_utf8(header).map_err(|_e| invalid("Header isn't utf8"))?;
        if !header.contains("'descr': '<f4'") || !header.contains("'fortran_order': False") {
            return Err(invalid("Only little endian f32 arrays are supported"));
        }

        let mut data = vec![];
        reader.read_to_end(&mut data)?;
        if data.len() % 4 != 0 {
            return Err(invalid("Truncated array data"));
        }
        Ok(data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    #[test]
    fn header_is_aligned() {
        for len in [0, 1, 7, 1024, 123_456] {
            let header = header(len);
            assert_eq!((10 + header.len()) % ALIGN, 0);
            assert_eq!(header.last(), Some(&b'\n'));
        }
    }

    #[test]
    fn writes_numpy_layout() {
        let mut buf = vec![];
        write_npy(&mut buf, &[1.0, -2.5]).expect("Failed to write");

        assert_eq!(&buf[..6], MAGIC);
        assert_eq!(&buf[6..8], &[1, 0]);
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        let header = std::str::from_utf8(&buf[10..10 + header_len]).expect("Header not utf8");
        assert!(header.starts_with("{'descr': '<f4', 'fortran_order': False, 'shape': (2,), }"));

        let data = &buf[10 + header_len..];
        assert_eq!(data.len(), 8);
        assert_eq!(&data[..4], &1.0f32.to_le_bytes());
        assert_eq!(read_npy(buf.as_slice()).expect("Failed to read"), vec![1.0, -2.5]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(read_npy(&b"definitely not numpy"[..]).is_err());
    }
}
