use super::{
    markers, read_context_header, read_context_header_text, read_handle, read_handle_text,
    read_marker, read_polys, read_polys_text, read_usize, write_context_header,
    write_context_header_text, write_handle, write_marker, write_polys, write_polys_text,
};
use crate::keys::{KeySwitch, KeySwitchStrategy, PublicKey, SecretKey};
use crate::{Ciphertext, Context, Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rlwe_math::rq::Representation;
use rlwe_traits::{write_list, ReadBinary, ReadText, TextReader, WriteBinary, WriteText};
use std::io::{Read, Write};
use std::sync::Arc;

impl WriteBinary for KeySwitch {
    fn write_binary<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_marker(writer, markers::KEY_SWITCH_BEGIN)?;
        write_handle(writer, &self.from_key)?;
        writer.write_u64::<LittleEndian>(self.to_key_id as u64)?;
        writer.write_u64::<LittleEndian>(self.ptxt_space)?;
        write_polys(writer, &self.b)?;
        writer.write_all(&self.prg_seed)?;
        writer.write_f64::<LittleEndian>(self.noise_var)?;
        write_marker(writer, markers::KEY_SWITCH_END)
    }
}

impl ReadBinary for KeySwitch {
    type Error = Error;
    type Parameters = Context;

    fn read_binary<R: Read>(reader: &mut R, ctx: &Arc<Context>) -> Result<Self> {
        read_marker(reader, markers::KEY_SWITCH_BEGIN)?;
        let from_key = read_handle(reader)?;
        let to_key_id = read_usize(reader)?;
        let ptxt_space = reader.read_u64::<LittleEndian>()?;
        let b = read_polys(reader, ctx)?;
        let mut prg_seed = [0u8; 32];
        reader.read_exact(&mut prg_seed)?;
        let noise_var = reader.read_f64::<LittleEndian>()?;
        read_marker(reader, markers::KEY_SWITCH_END)?;
        checked_matrix(
            KeySwitch {
                from_key,
                to_key_id,
                ptxt_space,
                b,
                prg_seed,
                noise_var,
            },
            ctx,
        )
    }
}

impl WriteText for KeySwitch {
    fn write_text(&self, out: &mut String) {
        out.push_str(&format!(
            "[{} {} {} ",
            self.from_key, self.to_key_id, self.ptxt_space
        ));
        write_polys_text(out, &self.b);
        out.push_str(&format!(
            " {} {:e}]",
            hex::encode(self.prg_seed),
            self.noise_var
        ));
    }
}

impl ReadText for KeySwitch {
    type Error = Error;
    type Parameters = Context;

    fn read_text(tokens: &mut TextReader<'_>, ctx: &Arc<Context>) -> Result<Self> {
        tokens.open()?;
        let from_key = read_handle_text(tokens)?;
        let to_key_id = tokens.parse()?;
        let ptxt_space = tokens.parse()?;
        let b = read_polys_text(tokens, ctx)?;
        let prg_seed = seed_from_hex(tokens.next_token()?)?;
        let noise_var = tokens.parse()?;
        tokens.close()?;
        checked_matrix(
            KeySwitch {
                from_key,
                to_key_id,
                ptxt_space,
                b,
                prg_seed,
                noise_var,
            },
            ctx,
        )
    }
}

fn checked_matrix(mut matrix: KeySwitch, ctx: &Context) -> Result<KeySwitch> {
    let all = ctx.all_primes();
    if matrix.b.len() != ctx.digits().len() || matrix.b.iter().any(|b| b.primes() != &all) {
        return Err(Error::SerializationError(format!(
            "Invalid key-switching matrix from {} to key {}",
            matrix.from_key, matrix.to_key_id
        )));
    }
    matrix
        .b
        .iter_mut()
        .for_each(|b| b.change_representation(Representation::Evaluation));
    Ok(matrix)
}

fn seed_from_hex(token: &str) -> Result<[u8; 32]> {
    let mut seed = [0u8; 32];
    hex::decode_to_slice(token, &mut seed)
        .map_err(|e| Error::SerializationError(format!("Invalid seed {token}: {e}")))?;
    Ok(seed)
}

/// The map is encoded with -1 for the elements that cannot be reached.
fn map_row(row: &[Option<usize>]) -> Vec<i64> {
    row.iter().map(|e| e.map_or(-1, |i| i as i64)).collect()
}

impl PublicKey {
    /// Rebuild the key-switching maps from the matrices, from the last key
    /// to the first one.
    fn rebuild_maps(&mut self, stored: &[Vec<i64>]) -> Result<()> {
        self.key_switch_map.clear();
        for id in (0..self.sk_sizes.len()).rev() {
            self.set_key_switch_map(id)?;
        }
        let rebuilt = self
            .key_switch_map
            .iter()
            .map(|row| map_row(row))
            .collect::<Vec<_>>();
        if rebuilt != stored {
            log::debug!("The stored key-switching map differs from the rebuilt one");
        }
        Ok(())
    }

    fn check_loaded(&self) -> Result<()> {
        if self.sk_sizes.is_empty() {
            return Err(Error::SerializationError(
                "The public key has no secret key".to_string(),
            ));
        }
        if let Some(matrix) = self
            .key_switching
            .iter()
            .find(|matrix| matrix.to_key_id >= self.sk_sizes.len())
        {
            return Err(Error::SerializationError(format!(
                "Key-switching matrix to the unknown key {}",
                matrix.to_key_id
            )));
        }
        Ok(())
    }
}

impl WriteBinary for PublicKey {
    fn write_binary<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_marker(writer, markers::PUBLIC_KEY_BEGIN)?;
        write_context_header(writer, &self.ctx)?;
        self.pub_encr_key.write_binary(writer)?;

        writer.write_u32::<LittleEndian>(self.sk_sizes.len() as u32)?;
        for size in &self.sk_sizes {
            writer.write_u64::<LittleEndian>(*size as u64)?;
        }
        writer.write_u32::<LittleEndian>(self.key_switching.len() as u32)?;
        for matrix in &self.key_switching {
            matrix.write_binary(writer)?;
        }
        writer.write_u32::<LittleEndian>(self.key_switch_map.len() as u32)?;
        for row in &self.key_switch_map {
            writer.write_u32::<LittleEndian>(row.len() as u32)?;
            for e in map_row(row) {
                writer.write_i64::<LittleEndian>(e)?;
            }
        }
        writer.write_u32::<LittleEndian>(self.strategies.len() as u32)?;
        for strategy in &self.strategies {
            writer.write_u8(strategy.to_u8())?;
        }

        match &self.recrypt {
            Some((id, ekey)) => {
                writer.write_i64::<LittleEndian>(*id as i64)?;
                ekey.write_binary(writer)?;
            }
            None => writer.write_i64::<LittleEndian>(-1)?,
        }
        write_marker(writer, markers::PUBLIC_KEY_END)
    }
}

impl ReadBinary for PublicKey {
    type Error = Error;
    type Parameters = Context;

    fn read_binary<R: Read>(reader: &mut R, ctx: &Arc<Context>) -> Result<Self> {
        read_marker(reader, markers::PUBLIC_KEY_BEGIN)?;
        read_context_header(reader, ctx)?;
        let mut pk = PublicKey::new(ctx);
        pk.pub_encr_key = Ciphertext::read_binary(reader, ctx)?;

        let n = reader.read_u32::<LittleEndian>()?;
        pk.sk_sizes = (0..n).map(|_| read_usize(reader)).collect::<Result<_>>()?;
        let n = reader.read_u32::<LittleEndian>()?;
        pk.key_switching = (0..n)
            .map(|_| KeySwitch::read_binary(reader, ctx))
            .collect::<Result<_>>()?;
        let n = reader.read_u32::<LittleEndian>()?;
        let mut stored = vec![];
        for _ in 0..n {
            let len = reader.read_u32::<LittleEndian>()? as usize;
            if len != 0 && len as u64 != ctx.m() {
                return Err(Error::SerializationError(format!(
                    "Invalid key-switching map of length {len}"
                )));
            }
            let mut row = vec![0i64; len];
            reader.read_i64_into::<LittleEndian>(&mut row)?;
            stored.push(row);
        }
        let n = reader.read_u32::<LittleEndian>()?;
        pk.strategies = (0..n)
            .map(|_| KeySwitchStrategy::from_u8(reader.read_u8()?))
            .collect::<Result<_>>()?;

        let recrypt_id = reader.read_i64::<LittleEndian>()?;
        if recrypt_id >= 0 {
            let ekey = Ciphertext::read_binary(reader, ctx)?;
            pk.recrypt = Some((recrypt_id as usize, ekey));
        }
        read_marker(reader, markers::PUBLIC_KEY_END)?;

        pk.check_loaded()?;
        pk.rebuild_maps(&stored)?;
        Ok(pk)
    }
}

impl WriteText for PublicKey {
    fn write_text(&self, out: &mut String) {
        out.push('[');
        write_context_header_text(out, &self.ctx);
        out.push('\n');
        self.pub_encr_key.write_text(out);
        out.push('\n');
        write_list(out, &self.sk_sizes);
        out.push_str(&format!("\n{}", self.key_switching.len()));
        for matrix in &self.key_switching {
            out.push('\n');
            matrix.write_text(out);
        }
        out.push_str("\n[");
        for row in &self.key_switch_map {
            write_list(out, &map_row(row));
        }
        out.push_str("]\n");
        write_list(
            out,
            &self.strategies.iter().map(|s| s.to_u8()).collect::<Vec<_>>(),
        );
        match &self.recrypt {
            Some((id, ekey)) => {
                out.push_str(&format!("\n{id} "));
                ekey.write_text(out);
            }
            None => out.push_str("\n-1"),
        }
        out.push(']');
    }
}

impl ReadText for PublicKey {
    type Error = Error;
    type Parameters = Context;

    fn read_text(tokens: &mut TextReader<'_>, ctx: &Arc<Context>) -> Result<Self> {
        tokens.open()?;
        read_context_header_text(tokens, ctx)?;
        let mut pk = PublicKey::new(ctx);
        pk.pub_encr_key = Ciphertext::read_text(tokens, ctx)?;
        pk.sk_sizes = tokens.parse_list()?;
        let n: usize = tokens.parse()?;
        pk.key_switching = (0..n)
            .map(|_| KeySwitch::read_text(tokens, ctx))
            .collect::<Result<_>>()?;
        tokens.open()?;
        let mut stored = vec![];
        while !tokens.at_close() {
            stored.push(tokens.parse_list::<i64>()?);
        }
        tokens.close()?;
        pk.strategies = tokens
            .parse_list::<u8>()?
            .into_iter()
            .map(KeySwitchStrategy::from_u8)
            .collect::<Result<_>>()?;
        let recrypt_id: i64 = tokens.parse()?;
        if recrypt_id >= 0 {
            let ekey = Ciphertext::read_text(tokens, ctx)?;
            pk.recrypt = Some((recrypt_id as usize, ekey));
        }
        tokens.close()?;

        pk.check_loaded()?;
        pk.rebuild_maps(&stored)?;
        Ok(pk)
    }
}

impl SecretKey {
    fn from_parts(pk: PublicKey, s_keys: Vec<rlwe_math::rq::Poly>) -> Result<Self> {
        let all = pk.ctx.all_primes();
        if s_keys.len() != pk.sk_sizes.len() || s_keys.iter().any(|s| s.primes() != &all) {
            return Err(Error::SerializationError(
                "The secrets do not match the public key".to_string(),
            ));
        }
        let mut sk = SecretKey { pk, s_keys };
        sk.s_keys
            .iter_mut()
            .for_each(|s| s.change_representation(Representation::Evaluation));
        Ok(sk)
    }
}

impl WriteBinary for SecretKey {
    fn write_binary<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_marker(writer, markers::SECRET_KEY_BEGIN)?;
        self.pk.write_binary(writer)?;
        write_polys(writer, &self.s_keys)?;
        write_marker(writer, markers::SECRET_KEY_END)
    }
}

impl ReadBinary for SecretKey {
    type Error = Error;
    type Parameters = Context;

    fn read_binary<R: Read>(reader: &mut R, ctx: &Arc<Context>) -> Result<Self> {
        read_marker(reader, markers::SECRET_KEY_BEGIN)?;
        let pk = PublicKey::read_binary(reader, ctx)?;
        let s_keys = read_polys(reader, ctx)?;
        read_marker(reader, markers::SECRET_KEY_END)?;
        SecretKey::from_parts(pk, s_keys)
    }
}

impl WriteText for SecretKey {
    fn write_text(&self, out: &mut String) {
        out.push('[');
        self.pk.write_text(out);
        out.push('\n');
        write_polys_text(out, &self.s_keys);
        out.push(']');
    }
}

impl ReadText for SecretKey {
    type Error = Error;
    type Parameters = Context;

    fn read_text(tokens: &mut TextReader<'_>, ctx: &Arc<Context>) -> Result<Self> {
        tokens.open()?;
        let pk = PublicKey::read_text(tokens, ctx)?;
        let s_keys = read_polys_text(tokens, ctx)?;
        tokens.close()?;
        SecretKey::from_parts(pk, s_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::seed_from_hex;
    use crate::keys::{KeyHandle, KeySwitch, PublicKey, SecretKey};
    use crate::serialization::markers;
    use crate::{ContextBuilder, Error as RlweError};
    use rand::{thread_rng, Rng};
    use rlwe_traits::{ReadBinary, ReadText, WriteBinary, WriteText};
    use std::error::Error;

    #[test]
    fn seed() -> Result<(), Box<dyn Error>> {
        let seed = thread_rng().gen::<[u8; 32]>();
        let encoded = hex::encode(seed);
        assert_eq!(encoded.len(), 64);
        assert_eq!(seed_from_hex(&encoded)?, seed);
        assert!(seed_from_hex(&encoded[1..]).is_err());
        assert!(seed_from_hex(&encoded[2..]).is_err());
        assert!(seed_from_hex(&"zz".repeat(32)).is_err());
        Ok(())
    }

    #[test]
    fn key_switch() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30, 30])
            .build_arc()?;
        let mut sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        sk.gen_key_switch_matrix(1, 3, 0, 0, 0, &mut rng)?;
        let matrix = sk
            .public_key()
            .get_key_switch_matrix(&KeyHandle::new(1, 3, 0), 0);

        let loaded = KeySwitch::from_bytes(&matrix.to_bytes(), &ctx)?;
        assert_eq!(&loaded, matrix);
        assert_eq!(loaded.noise_var(), matrix.noise_var());
        let loaded = KeySwitch::from_text(&matrix.to_text(), &ctx)?;
        assert_eq!(&loaded, matrix);

        // The matrix must have one polynomial per digit.
        let other = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30])
            .build_arc()?;
        assert!(KeySwitch::from_bytes(&matrix.to_bytes(), &other).is_err());
        Ok(())
    }

    #[test]
    fn corrupted_map_length() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30, 30])
            .build_arc()?;
        let mut sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        sk.add_some_1d_matrices(0, &mut rng)?;
        let pk = sk.public_key();
        let bytes = pk.to_bytes();
        assert_eq!(&PublicKey::from_bytes(&bytes, &ctx)?, pk);

        // Offset of the length of the first row of the key-switching map.
        let tail = markers::PUBLIC_KEY_END.len()
            + 8
            + 4
            + pk.strategies.len()
            + pk
                .key_switch_map
                .iter()
                .map(|row| 4 + 8 * row.len())
                .sum::<usize>();
        let offset = bytes.len() - tail;
        assert_eq!(bytes[offset..offset + 4], 16u32.to_le_bytes());
        for len in [u32::MAX, 15] {
            let mut corrupted = bytes.clone();
            corrupted[offset..offset + 4].copy_from_slice(&len.to_le_bytes());
            assert!(matches!(
                PublicKey::from_bytes(&corrupted, &ctx),
                Err(RlweError::SerializationError(_))
            ));
        }
        Ok(())
    }
}
