use super::{markers, read_handle, read_handle_text, read_marker, write_handle, write_marker};
use crate::ciphertext::CiphertextPart;
use crate::{Ciphertext, Context, Error};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rlwe_math::rq::{Poly, PrimeSet, Representation};
use rlwe_traits::{ReadBinary, ReadText, TextReader, WriteBinary, WriteText};
use std::io::{Read, Write};
use std::sync::Arc;

impl WriteBinary for Ciphertext {
    fn write_binary<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_marker(writer, markers::CIPHERTEXT_BEGIN)?;
        self.prime_set.write_binary(writer)?;
        writer.write_u64::<LittleEndian>(self.ptxt_space)?;
        writer.write_f64::<LittleEndian>(self.noise_var)?;
        writer.write_f64::<LittleEndian>(self.rat_factor)?;
        writer.write_u32::<LittleEndian>(self.parts.len() as u32)?;
        for part in &self.parts {
            write_handle(writer, &part.handle)?;
            part.poly.write_binary(writer)?;
        }
        write_marker(writer, markers::CIPHERTEXT_END)
    }
}

impl ReadBinary for Ciphertext {
    type Error = Error;
    type Parameters = Context;

    fn read_binary<R: Read>(reader: &mut R, ctx: &Arc<Context>) -> Result<Self, Self::Error> {
        read_marker(reader, markers::CIPHERTEXT_BEGIN)?;
        let prime_set = PrimeSet::read_binary(reader)?;
        let ptxt_space = reader.read_u64::<LittleEndian>()?;
        let noise_var = reader.read_f64::<LittleEndian>()?;
        let rat_factor = reader.read_f64::<LittleEndian>()?;
        let n = reader.read_u32::<LittleEndian>()?;
        let mut parts = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let handle = read_handle(reader)?;
            let poly = Poly::read_binary(reader, ctx.ring())?;
            parts.push(checked_part(poly, handle, &prime_set)?);
        }
        read_marker(reader, markers::CIPHERTEXT_END)?;
        Ok(Ciphertext {
            ctx: ctx.clone(),
            parts,
            prime_set,
            ptxt_space,
            noise_var,
            rat_factor,
        })
    }
}

impl WriteText for Ciphertext {
    fn write_text(&self, out: &mut String) {
        out.push('[');
        self.prime_set.write_text(out);
        out.push_str(&format!(
            " {} {:e} {:e} {}",
            self.ptxt_space,
            self.noise_var,
            self.rat_factor,
            self.parts.len()
        ));
        for part in &self.parts {
            out.push_str(&format!("\n{} ", part.handle));
            part.poly.write_text(out);
        }
        out.push(']');
    }
}

impl ReadText for Ciphertext {
    type Error = Error;
    type Parameters = Context;

    fn read_text(tokens: &mut TextReader<'_>, ctx: &Arc<Context>) -> Result<Self, Self::Error> {
        tokens.open()?;
        let prime_set = PrimeSet::read_text(tokens)?;
        let ptxt_space = tokens.parse()?;
        let noise_var = tokens.parse()?;
        let rat_factor = tokens.parse()?;
        let n: usize = tokens.parse()?;
        let mut parts = Vec::with_capacity(n);
        for _ in 0..n {
            let handle = read_handle_text(tokens)?;
            let poly = Poly::read_text(tokens, ctx.ring())?;
            parts.push(checked_part(poly, handle, &prime_set)?);
        }
        tokens.close()?;
        Ok(Ciphertext {
            ctx: ctx.clone(),
            parts,
            prime_set,
            ptxt_space,
            noise_var,
            rat_factor,
        })
    }
}

fn checked_part(
    mut poly: Poly,
    handle: crate::keys::KeyHandle,
    prime_set: &PrimeSet,
) -> Result<CiphertextPart, Error> {
    if poly.primes() != prime_set {
        return Err(Error::SerializationError(format!(
            "Ciphertext part over the primes {}, expected {}",
            poly.primes(),
            prime_set
        )));
    }
    poly.change_representation(Representation::Evaluation);
    Ok(CiphertextPart { poly, handle })
}
