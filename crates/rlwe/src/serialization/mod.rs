//! Binary and text serialization of ciphertexts and keys.
//!
//! The binary encoding uses little-endian integers, and every block is framed
//! by the begin and end [`markers`]. The text encoding is made of
//! bracket-delimited, whitespace-separated tokens.

mod ciphertext;
mod keys;

use crate::keys::KeyHandle;
use crate::{Context, Error, Result, Scheme};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rlwe_math::rq::Poly;
use rlwe_traits::{ReadBinary, ReadText, TextReader, WriteBinary, WriteText};
use std::io::{Read, Write};

/// Eye-catchers delimiting the blocks of the binary encoding.
pub mod markers {
    /// Start of a key-switching matrix.
    pub const KEY_SWITCH_BEGIN: &[u8] = b"|SKM_BEGIN|";
    /// End of a key-switching matrix.
    pub const KEY_SWITCH_END: &[u8] = b"|SKM_END|";
    /// Start of a public key.
    pub const PUBLIC_KEY_BEGIN: &[u8] = b"|PK_BEGIN|";
    /// End of a public key.
    pub const PUBLIC_KEY_END: &[u8] = b"|PK_END|";
    /// Start of a secret key.
    pub const SECRET_KEY_BEGIN: &[u8] = b"|SK_BEGIN|";
    /// End of a secret key.
    pub const SECRET_KEY_END: &[u8] = b"|SK_END|";
    /// Start of a ciphertext.
    pub const CIPHERTEXT_BEGIN: &[u8] = b"|CT_BEGIN|";
    /// End of a ciphertext.
    pub const CIPHERTEXT_END: &[u8] = b"|CT_END|";
}

pub(crate) fn write_marker<W: Write>(writer: &mut W, marker: &[u8]) -> std::io::Result<()> {
    writer.write_all(marker)
}

pub(crate) fn read_marker<R: Read>(reader: &mut R, marker: &[u8]) -> Result<()> {
    let mut found = vec![0u8; marker.len()];
    reader.read_exact(&mut found)?;
    if found == marker {
        Ok(())
    } else {
        Err(Error::SerializationError(format!(
            "Expected the marker {}, found {}",
            String::from_utf8_lossy(marker),
            String::from_utf8_lossy(&found)
        )))
    }
}

pub(crate) fn write_handle<W: Write>(writer: &mut W, handle: &KeyHandle) -> std::io::Result<()> {
    writer.write_u64::<LittleEndian>(handle.power_of_s())?;
    writer.write_u64::<LittleEndian>(handle.power_of_x())?;
    writer.write_u64::<LittleEndian>(handle.secret_key_id() as u64)
}

pub(crate) fn read_handle<R: Read>(reader: &mut R) -> Result<KeyHandle> {
    let power_of_s = reader.read_u64::<LittleEndian>()?;
    let power_of_x = reader.read_u64::<LittleEndian>()?;
    let secret_key_id = read_usize(reader)?;
    Ok(KeyHandle::new(power_of_s, power_of_x, secret_key_id))
}

pub(crate) fn read_handle_text(tokens: &mut TextReader<'_>) -> Result<KeyHandle> {
    tokens.open()?;
    let power_of_s = tokens.parse()?;
    let power_of_x = tokens.parse()?;
    let secret_key_id = tokens.parse()?;
    tokens.close()?;
    Ok(KeyHandle::new(power_of_s, power_of_x, secret_key_id))
}

pub(crate) fn read_usize<R: Read>(reader: &mut R) -> Result<usize> {
    let v = reader.read_u64::<LittleEndian>()?;
    usize::try_from(v).map_err(|e| Error::SerializationError(e.to_string()))
}

pub(crate) fn write_polys<W: Write>(writer: &mut W, polys: &[Poly]) -> std::io::Result<()> {
    writer.write_u32::<LittleEndian>(polys.len() as u32)?;
    polys.iter().try_for_each(|p| p.write_binary(writer))
}

pub(crate) fn read_polys<R: Read>(reader: &mut R, ctx: &Context) -> Result<Vec<Poly>> {
    let n = reader.read_u32::<LittleEndian>()?;
    (0..n)
        .map(|_| Ok(Poly::read_binary(reader, ctx.ring())?))
        .collect()
}

pub(crate) fn write_polys_text(out: &mut String, polys: &[Poly]) {
    out.push('[');
    for (i, p) in polys.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        p.write_text(out);
    }
    out.push(']');
}

pub(crate) fn read_polys_text(tokens: &mut TextReader<'_>, ctx: &Context) -> Result<Vec<Poly>> {
    tokens.open()?;
    let mut polys = vec![];
    while !tokens.at_close() {
        polys.push(Poly::read_text(tokens, ctx.ring())?);
    }
    tokens.close()?;
    Ok(polys)
}

/// Write the parameters that identify the plaintext algebra of the context:
/// the scheme, m, p, r, and the generators and orders of the hypercube.
pub(crate) fn write_context_header<W: Write>(writer: &mut W, ctx: &Context) -> std::io::Result<()> {
    writer.write_u8(ctx.scheme().to_u8())?;
    writer.write_u64::<LittleEndian>(ctx.m())?;
    writer.write_u64::<LittleEndian>(ctx.p())?;
    writer.write_u64::<LittleEndian>(ctx.r() as u64)?;
    let zm = ctx.zm();
    writer.write_u32::<LittleEndian>(zm.num_gens() as u32)?;
    for (g, o) in zm.gens().iter().zip(zm.ords()) {
        writer.write_u64::<LittleEndian>(*g)?;
        writer.write_u64::<LittleEndian>(*o as u64)?;
    }
    Ok(())
}

pub(crate) fn read_context_header<R: Read>(reader: &mut R, ctx: &Context) -> Result<()> {
    let scheme = Scheme::from_u8(reader.read_u8()?)?;
    let m = reader.read_u64::<LittleEndian>()?;
    let p = reader.read_u64::<LittleEndian>()?;
    let r = read_usize(reader)?;
    let n = reader.read_u32::<LittleEndian>()?;
    let mut gens = vec![];
    let mut ords = vec![];
    for _ in 0..n {
        gens.push(reader.read_u64::<LittleEndian>()?);
        ords.push(read_usize(reader)?);
    }
    check_context_header(ctx, scheme, m, p, r, &gens, &ords)
}

pub(crate) fn write_context_header_text(out: &mut String, ctx: &Context) {
    let zm = ctx.zm();
    out.push_str(&format!(
        "[{} {} {} {} ",
        ctx.scheme().to_u8(),
        ctx.m(),
        ctx.p(),
        ctx.r()
    ));
    rlwe_traits::write_list(out, zm.gens());
    out.push(' ');
    rlwe_traits::write_list(out, zm.ords());
    out.push(']');
}

pub(crate) fn read_context_header_text(tokens: &mut TextReader<'_>, ctx: &Context) -> Result<()> {
    tokens.open()?;
    let scheme = Scheme::from_u8(tokens.parse()?)?;
    let m = tokens.parse()?;
    let p = tokens.parse()?;
    let r = tokens.parse()?;
    let gens = tokens.parse_list()?;
    let ords = tokens.parse_list()?;
    tokens.close()?;
    check_context_header(ctx, scheme, m, p, r, &gens, &ords)
}

fn check_context_header(
    ctx: &Context,
    scheme: Scheme,
    m: u64,
    p: u64,
    r: usize,
    gens: &[u64],
    ords: &[usize],
) -> Result<()> {
    if ctx.scheme() == scheme
        && ctx.p() == p && ctx.r() == r && ctx.zm().matches(m, ctx.zm().frobenius(), gens, ords) {
        Ok(())
    } else {
        log::warn!(
            "Loaded parameters {scheme} m = {m}, p = {p}, r = {r}, gens = {gens:?}, ords = {ords:?} do not match the context"
        );
        Err(Error::ContextMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        markers, read_context_header, read_context_header_text, read_handle, read_handle_text,
        read_marker, write_context_header, write_context_header_text, write_handle,
        write_marker,
    };
    use crate::keys::KeyHandle;
    use crate::{ContextBuilder, Error as RlweError, Scheme};
    use rlwe_traits::TextReader;
    use std::error::Error;

    #[test]
    fn marker() -> Result<(), Box<dyn Error>> {
        let mut bytes = vec![];
        write_marker(&mut bytes, markers::PUBLIC_KEY_BEGIN)?;
        assert_eq!(bytes, b"|PK_BEGIN|");
        read_marker(&mut bytes.as_slice(), markers::PUBLIC_KEY_BEGIN)?;
        assert!(matches!(
            read_marker(&mut bytes.as_slice(), markers::SECRET_KEY_BEGIN),
            Err(RlweError::SerializationError(_))
        ));
        assert!(read_marker(&mut &bytes[..4], markers::PUBLIC_KEY_BEGIN).is_err());
        Ok(())
    }

    #[test]
    fn handle() -> Result<(), Box<dyn Error>> {
        for handle in [KeyHandle::one(), KeyHandle::base(2), KeyHandle::new(2, 3, 1)] {
            let mut bytes = vec![];
            write_handle(&mut bytes, &handle)?;
            assert_eq!(read_handle(&mut bytes.as_slice())?, handle);
            assert_eq!(
                read_handle_text(&mut TextReader::new(&handle.to_string()))?,
                handle
            );
        }
        Ok(())
    }

    #[test]
    fn context_header() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30])
            .build()?;
        let other = ContextBuilder::new()
            .set_m(32)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30])
            .build()?;

        let mut bytes = vec![];
        write_context_header(&mut bytes, &ctx)?;
        read_context_header(&mut bytes.as_slice(), &ctx)?;
        assert_eq!(
            read_context_header(&mut bytes.as_slice(), &other),
            Err(RlweError::ContextMismatch)
        );

        let mut text = String::new();
        write_context_header_text(&mut text, &ctx);
        assert_eq!(text, "[0 16 17 1 [3 7] [4 2]]");
        read_context_header_text(&mut TextReader::new(&text), &ctx)?;
        assert!(read_context_header_text(&mut TextReader::new(&text), &other).is_err());

        // Same ring, other scheme.
        let approximate = ContextBuilder::new()
            .set_scheme(Scheme::Ckks)
            .set_m(16)
            .set_ciphertext_moduli_sizes(&[30])
            .build()?;
        assert_eq!(
            read_context_header(&mut bytes.as_slice(), &approximate),
            Err(RlweError::ContextMismatch)
        );
        bytes[0] = 7;
        assert!(matches!(
            read_context_header(&mut bytes.as_slice(), &ctx),
            Err(RlweError::SerializationError(_))
        ));
        Ok(())
    }
}
