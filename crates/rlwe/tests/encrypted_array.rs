#![allow(missing_docs)]

use num_complex::Complex64;
use rand::{thread_rng, Rng};
use rlwe::encrypted_array::{EncryptedArray, Slots};
use rlwe::keys::SecretKey;
use rlwe::{ContextBuilder, Scheme};
use std::error::Error;

#[test]
fn eight_slots() -> Result<(), Box<dyn Error>> {
    let mut rng = thread_rng();
    let ctx = ContextBuilder::new()
        .set_m(16)
        .set_p(17)
        .set_ciphertext_moduli_sizes(&[50, 50])
        .build_arc()?;
    let ea = EncryptedArray::new(&ctx)?;
    assert_eq!(ea.size(), 8);

    let mut some = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    some.add_some_1d_matrices(0, &mut rng)?;
    let mut full = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    full.add_1d_matrices(0, &mut rng)?;

    let values: Vec<i64> = (1..=8).collect();
    for sk in [&some, &full] {
        let pk = sk.public_key();
        let ct = ea.encrypt_integers(pk, &values, &mut rng)?;
        assert_eq!(ea.decrypt_integers(sk, &ct)?, values);

        let mut rotated = ct.clone();
        ea.rotate(&mut rotated, pk, 1)?;
        assert_eq!(ea.decrypt_integers(sk, &rotated)?, vec![8, 1, 2, 3, 4, 5, 6, 7]);

        let mut shifted = ct.clone();
        ea.shift(&mut shifted, pk, 1)?;
        assert_eq!(ea.decrypt_integers(sk, &shifted)?, vec![0, 1, 2, 3, 4, 5, 6, 7]);

        let mut shifted = ct.clone();
        ea.shift(&mut shifted, pk, -3)?;
        assert_eq!(ea.decrypt_integers(sk, &shifted)?, vec![4, 5, 6, 7, 8, 0, 0, 0]);

        let mut shifted = ct.clone();
        ea.shift(&mut shifted, pk, 8)?;
        assert_eq!(ea.decrypt_integers(sk, &shifted)?, vec![0; 8]);

        for k in -9..=9 {
            let mut rotated = ct.clone();
            ea.rotate(&mut rotated, pk, k)?;
            assert_eq!(
                ea.decrypt_integers(sk, &rotated)?,
                ea.rotate_slots(&values, k)?
            );
        }

        for i in 0..ea.dimension() {
            for k in -2..=4 {
                let mut rotated = ct.clone();
                ea.rotate_1d(&mut rotated, pk, i, k, false)?;
                assert_eq!(
                    ea.decrypt_integers(sk, &rotated)?,
                    ea.rotate_1d_slots(&values, i, k)?
                );
                let mut shifted = ct.clone();
                ea.shift_1d(&mut shifted, pk, i, k)?;
                assert_eq!(
                    ea.decrypt_integers(sk, &shifted)?,
                    ea.shift_1d_slots(&values, i, k)?
                );
            }
        }
        assert!(ea.rotate_1d(&mut ct.clone(), pk, 2, 1, false).is_err());
    }
    Ok(())
}

#[test]
fn rotation_group_action() -> Result<(), Box<dyn Error>> {
    let mut rng = thread_rng();
    let ctx = ContextBuilder::new()
        .set_m(16)
        .set_p(17)
        .set_ciphertext_moduli_sizes(&[50, 50, 50])
        .build_arc()?;
    let ea = EncryptedArray::new(&ctx)?;
    let mut sk = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    sk.add_some_1d_matrices(0, &mut rng)?;
    let pk = sk.public_key();

    let values = (0..8).map(|_| rng.gen_range(0..17)).collect::<Vec<i64>>();
    for _ in 0..4 {
        let (k1, k2) = (rng.gen_range(-8..8), rng.gen_range(-8..8));
        let mut twice = ea.encrypt_integers(pk, &values, &mut rng)?;
        ea.rotate(&mut twice, pk, k1)?;
        ea.rotate(&mut twice, pk, k2)?;
        let mut once = ea.encrypt_integers(pk, &values, &mut rng)?;
        ea.rotate(&mut once, pk, k1 + k2)?;
        assert_eq!(ea.decrypt_integers(&sk, &twice)?, ea.decrypt_integers(&sk, &once)?);
        assert_eq!(
            ea.decrypt_integers(&sk, &once)?,
            ea.rotate_slots(&values, k1 + k2)?
        );
    }
    Ok(())
}

#[test]
fn non_native_dimension() -> Result<(), Box<dyn Error>> {
    let mut rng = thread_rng();
    let ctx = ContextBuilder::new()
        .set_m(17)
        .set_p(67)
        .set_ciphertext_moduli_sizes(&[50, 50])
        .build_arc()?;
    let ea = EncryptedArray::new(&ctx)?;
    assert_eq!(ea.size(), 8);
    assert_eq!(ea.dimension(), 1);
    assert!(!ea.native_dimension(0));

    let mut sk = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    sk.add_some_1d_matrices(0, &mut rng)?;
    let pk = sk.public_key();

    let Slots::RingElements(values) = ea.random(&mut rng) else {
        panic!("ring elements expected")
    };
    let slots = Slots::RingElements(values.clone());
    let ct = ea.encrypt(pk, &slots, &mut rng)?;
    assert_eq!(ea.decrypt_slots(&sk, &ct)?, slots);

    for k in [1, 3, 7, -2] {
        let mut rotated = ct.clone();
        ea.rotate(&mut rotated, pk, k)?;
        assert_eq!(
            ea.decrypt_slots(&sk, &rotated)?,
            Slots::RingElements(ea.rotate_slots(&values, k)?)
        );

        // Without the correction, only the slots which do not wrap around
        // are meaningful.
        let mut rotated = ct.clone();
        ea.rotate_1d(&mut rotated, pk, 0, k, true)?;
        let Slots::RingElements(decrypted) = ea.decrypt_slots(&sk, &rotated)? else {
            panic!("ring elements expected")
        };
        let expected = ea.rotate_slots(&values, k)?;
        let k = k.rem_euclid(8) as usize;
        assert_eq!(decrypted[k..], expected[k..]);

        let mut shifted = ct.clone();
        ea.shift_1d(&mut shifted, pk, 0, k as i64)?;
        assert_eq!(
            ea.decrypt_slots(&sk, &shifted)?,
            Slots::RingElements(ea.shift_slots(&values, k as i64)?)
        );
    }
    Ok(())
}

#[test]
fn lin_poly() -> Result<(), Box<dyn Error>> {
    let mut rng = thread_rng();
    let ctx = ContextBuilder::new()
        .set_m(15)
        .set_p(2)
        .set_ciphertext_moduli_sizes(&[50, 50])
        .build_arc()?;
    let ea = EncryptedArray::new(&ctx)?;
    let exact = ea.exact().ok_or("exact array expected")?;
    assert_eq!(exact.degree(), 4);

    let mut sk = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    sk.add_frobenius_matrices(0, &mut rng)?;
    let pk = sk.public_key();

    let images = (0..2).flat_map(|_| exact.random(&mut rng)).collect::<Vec<_>>();
    let coeffs = ea.build_lin_poly_coeffs(&images)?;

    let Slots::RingElements(values) = ea.random(&mut rng) else {
        panic!("ring elements expected")
    };
    let mut ct = ea.encrypt(pk, &Slots::RingElements(values.clone()), &mut rng)?;
    ea.apply_lin_poly(&mut ct, pk, &coeffs)?;
    let expected = values
        .iter()
        .map(|x| exact.eval_lin_poly(&coeffs, x))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(ea.decrypt_slots(&sk, &ct)?, Slots::RingElements(expected));
    Ok(())
}

#[test]
fn prime_power_plaintexts() -> Result<(), Box<dyn Error>> {
    let mut rng = thread_rng();
    let ctx = ContextBuilder::new()
        .set_m(16)
        .set_p(17)
        .set_r(2)
        .set_ciphertext_moduli_sizes(&[50, 50])
        .build_arc()?;
    let ea = EncryptedArray::new(&ctx)?;
    assert_eq!(ea.size(), 8);
    let mut sk = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    sk.add_some_1d_matrices(0, &mut rng)?;
    let pk = sk.public_key();

    let values = (0..8).map(|_| rng.gen_range(0..289)).collect::<Vec<i64>>();
    let ct = ea.encrypt_integers(pk, &values, &mut rng)?;
    assert_eq!(ct.ptxt_space(), 289);
    assert_eq!(ea.decrypt_integers(&sk, &ct)?, values);
    for k in [1, -3, 5] {
        let mut rotated = ct.clone();
        ea.rotate(&mut rotated, pk, k)?;
        assert_eq!(ea.decrypt_integers(&sk, &rotated)?, ea.rotate_slots(&values, k)?);
        let mut shifted = ct.clone();
        ea.shift(&mut shifted, pk, k)?;
        assert_eq!(ea.decrypt_integers(&sk, &shifted)?, ea.shift_slots(&values, k)?);
    }

    // Linearized polynomials over the Galois ring Z_4[X]/G.
    let ctx = ContextBuilder::new()
        .set_m(15)
        .set_p(2)
        .set_r(2)
        .set_ciphertext_moduli_sizes(&[50, 50])
        .build_arc()?;
    let ea = EncryptedArray::new(&ctx)?;
    let exact = ea.exact().ok_or("exact array expected")?;
    let mut sk = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    sk.add_frobenius_matrices(0, &mut rng)?;
    let pk = sk.public_key();

    let images = (0..2).flat_map(|_| exact.random(&mut rng)).collect::<Vec<_>>();
    let coeffs = ea.build_lin_poly_coeffs(&images)?;
    let Slots::RingElements(values) = ea.random(&mut rng) else {
        panic!("ring elements expected")
    };
    let mut ct = ea.encrypt(pk, &Slots::RingElements(values.clone()), &mut rng)?;
    ea.apply_lin_poly(&mut ct, pk, &coeffs)?;
    let expected = values
        .iter()
        .map(|x| exact.eval_lin_poly(&coeffs, x))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(ea.decrypt_slots(&sk, &ct)?, Slots::RingElements(expected));
    Ok(())
}

#[test]
fn complex_slots() -> Result<(), Box<dyn Error>> {
    let mut rng = thread_rng();
    let ctx = ContextBuilder::new()
        .set_scheme(Scheme::Ckks)
        .set_m(32)
        .set_ciphertext_moduli_sizes(&[50, 50])
        .build_arc()?;
    let ea = EncryptedArray::new(&ctx)?;
    assert_eq!(ea.size(), 8);
    assert_eq!(ea.dimension(), 1);
    assert!(ea.native_dimension(0));

    let mut sk = SecretKey::generate(&ctx, 0, 0, 2, &mut rng)?;
    sk.add_some_1d_matrices(0, &mut rng)?;
    let pk = sk.public_key();

    let Slots::Complex(values) = ea.random(&mut rng) else {
        panic!("complex slots expected")
    };
    let ct = ea.encrypt_complex(pk, &values, &mut rng)?;
    let close = |a: &[Complex64], b: &[Complex64]| {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).norm() < 1e-3)
    };
    assert!(close(&ea.decrypt_complex(&sk, &ct)?, &values));

    for k in [1, 5, -1] {
        let mut rotated = ct.clone();
        ea.rotate(&mut rotated, pk, k)?;
        assert!(close(
            &ea.decrypt_complex(&sk, &rotated)?,
            &ea.rotate_slots(&values, k)?
        ));

        let mut shifted = ct.clone();
        ea.shift(&mut shifted, pk, k)?;
        assert!(close(
            &ea.decrypt_complex(&sk, &shifted)?,
            &ea.shift_slots(&values, k)?
        ));
    }
    Ok(())
}
