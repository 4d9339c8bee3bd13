//! Implementation of serialization and deserialization.

use std::io::{Read, Write};
use std::sync::Arc;

use super::{Context, Poly, PrimeSet, Representation};
use crate::Error;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use rlwe_traits::{write_list, ReadBinary, ReadText, TextReader, WriteBinary, WriteText};

impl WriteBinary for PrimeSet {
    fn write_binary<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self.len() as u32)?;
        for i in self.iter() {
            writer.write_u32::<LittleEndian>(i as u32)?;
        }
        Ok(())
    }
}

impl PrimeSet {
    /// Read a prime set written with [`WriteBinary`].
    pub fn read_binary<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let n = reader.read_u32::<LittleEndian>()?;
        (0..n)
            .map(|_| reader.read_u32::<LittleEndian>().map(|i| i as usize))
            .collect()
    }

    /// Read a prime set written with [`WriteText`].
    pub fn read_text(tokens: &mut TextReader<'_>) -> Result<Self, rlwe_traits::ParseError> {
        Ok(tokens.parse_list::<usize>()?.into_iter().collect())
    }
}

impl WriteText for PrimeSet {
    fn write_text(&self, out: &mut String) {
        write_list(out, &self.to_vec())
    }
}

impl WriteBinary for Poly {
    fn write_binary<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u8(self.representation.to_u8())?;
        self.primes.write_binary(writer)?;
        for c in self.coefficients.iter() {
            writer.write_u64::<LittleEndian>(*c)?;
        }
        Ok(())
    }
}

impl ReadBinary for Poly {
    type Error = Error;
    type Parameters = Context;

    fn read_binary<R: Read>(reader: &mut R, ctx: &Arc<Context>) -> Result<Self, Self::Error> {
        let representation = Representation::from_u8(reader.read_u8()?)?;
        let primes = PrimeSet::read_binary(reader)?;
        ctx.moduli_of(&primes)?;
        let mut values = vec![0u64; primes.len() * ctx.degree()];
        reader.read_u64_into::<LittleEndian>(&mut values)?;
        let coefficients = Array2::from_shape_vec((primes.len(), ctx.degree()), values)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Poly::from_coefficients(ctx, &primes, representation, coefficients)
    }
}

impl WriteText for Poly {
    fn write_text(&self, out: &mut String) {
        out.push('[');
        out.push_str(&self.representation.to_u8().to_string());
        out.push(' ');
        self.primes.write_text(out);
        for row in self.coefficients.outer_iter() {
            out.push(' ');
            write_list(out, &row.to_vec());
        }
        out.push(']');
    }
}

impl ReadText for Poly {
    type Error = Error;
    type Parameters = Context;

    fn read_text(tokens: &mut TextReader<'_>, ctx: &Arc<Context>) -> Result<Self, Self::Error> {
        tokens.open()?;
        let representation = Representation::from_u8(tokens.parse()?)?;
        let primes = PrimeSet::read_text(tokens)?;
        ctx.moduli_of(&primes)?;
        let mut values = Vec::with_capacity(primes.len() * ctx.degree());
        for _ in 0..primes.len() {
            let row = tokens.parse_list::<u64>()?;
            if row.len() != ctx.degree() {
                return Err(Error::Serialization(format!(
                    "Expected {} coefficients, found {}",
                    ctx.degree(),
                    row.len()
                )));
            }
            values.extend(row);
        }
        tokens.close()?;
        let coefficients = Array2::from_shape_vec((primes.len(), ctx.degree()), values)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Poly::from_coefficients(ctx, &primes, representation, coefficients)
    }
}
