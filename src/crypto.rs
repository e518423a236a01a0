//! CryptoNote primitives over secp256k1
//!
//! One-time output keys, key images and ring signatures follow the classic
//! CryptoNote constructions, expressed on the secp256k1 group:
//!
//! - derivation `D = r·A`, output key `P = Hs(D ‖ i)·G + B`
//! - key image `I = x·Hp(P)`
//! - ring signature over `(prefix hash, I, P₀..Pₙ)` with one `(c, r)` pair per member
//!
//! Signing nonces are derived from the secret key and the message, so the same
//! inputs always produce the same signature.

use crate::error::{ConsensusError, Result};
use crate::types::*;
use once_cell::sync::Lazy;
use rand::Rng;
use secp256k1::{All, Scalar, Secp256k1};
use sha2::{Digest, Sha256};

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

fn secp() -> &'static Secp256k1<All> {
    &SECP
}

/// FastHash: 𝔹* → ℍ
pub fn fast_hash(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hs: 𝔹* → ℤₙ \ {0}
///
/// Digests that do not reduce to a valid nonzero scalar are rehashed.
fn hash_to_scalar(data: &[u8]) -> secp256k1::SecretKey {
    let mut digest = fast_hash(data);
    loop {
        if let Ok(scalar) = secp256k1::SecretKey::from_slice(&digest) {
            return scalar;
        }
        digest = fast_hash(&digest);
    }
}

/// Hp: 𝔹* → 𝔾, try-and-increment on the x coordinate
fn hash_to_point(data: &[u8]) -> secp256k1::PublicKey {
    let mut digest = fast_hash(data);
    loop {
        let mut candidate = [0u8; 33];
        candidate[0] = 0x02;
        candidate[1..].copy_from_slice(&digest);
        if let Ok(point) = secp256k1::PublicKey::from_slice(&candidate) {
            return point;
        }
        digest = fast_hash(&digest);
    }
}

fn to_point(key: &[u8; 33]) -> Result<secp256k1::PublicKey> {
    secp256k1::PublicKey::from_slice(key).map_err(|e| ConsensusError::Crypto(e.to_string()))
}

fn to_scalar(key: &SecretKey) -> Result<secp256k1::SecretKey> {
    secp256k1::SecretKey::from_slice(&key.0).map_err(|e| ConsensusError::Crypto(e.to_string()))
}

fn crypto_error(e: secp256k1::Error) -> ConsensusError {
    ConsensusError::Crypto(e.to_string())
}

/// Whether the bytes decode to a curve point
pub fn check_key(key: &PublicKey) -> bool {
    secp256k1::PublicKey::from_slice(&key.0).is_ok()
}

pub fn secret_key_to_public_key(secret_key: &SecretKey) -> Result<PublicKey> {
    let scalar = to_scalar(secret_key)?;
    Ok(PublicKey(secp256k1::PublicKey::from_secret_key(secp(), &scalar).serialize()))
}

fn key_pair_from_scalar(scalar: secp256k1::SecretKey) -> KeyPair {
    KeyPair {
        public_key: PublicKey(secp256k1::PublicKey::from_secret_key(secp(), &scalar).serialize()),
        secret_key: SecretKey(scalar.secret_bytes()),
    }
}

/// Fresh random key pair
pub fn generate_keys() -> KeyPair {
    let mut rng = rand::thread_rng();
    loop {
        let candidate: [u8; 32] = rng.gen();
        if let Ok(scalar) = secp256k1::SecretKey::from_slice(&candidate) {
            return key_pair_from_scalar(scalar);
        }
    }
}

/// Key pair derived from a seed: x = Hs(seed)
pub fn generate_deterministic_keys(seed: &[u8]) -> KeyPair {
    key_pair_from_scalar(hash_to_scalar(seed))
}

/// GenerateKeyDerivation: 𝒫 × 𝒮 → 𝒟, D = r·A
pub fn generate_key_derivation(public_key: &PublicKey, secret_key: &SecretKey) -> Result<KeyDerivation> {
    let point = to_point(&public_key.0)?;
    let scalar = to_scalar(secret_key)?;
    let shared = point.mul_tweak(secp(), &Scalar::from(scalar)).map_err(crypto_error)?;
    Ok(KeyDerivation(shared.serialize()))
}

fn derivation_to_scalar(derivation: &KeyDerivation, output_index: usize) -> secp256k1::SecretKey {
    let mut data = Vec::with_capacity(33 + 10);
    data.extend_from_slice(&derivation.0);
    crate::serialization::write_varint(&mut data, output_index as u64);
    hash_to_scalar(&data)
}

/// DerivePublicKey: P = Hs(D ‖ i)·G + B
pub fn derive_public_key(derivation: &KeyDerivation, output_index: usize, base: &PublicKey) -> Result<PublicKey> {
    let base = to_point(&base.0)?;
    let tweak = Scalar::from(derivation_to_scalar(derivation, output_index));
    let derived = base.add_exp_tweak(secp(), &tweak).map_err(crypto_error)?;
    Ok(PublicKey(derived.serialize()))
}

/// DeriveSecretKey: x = Hs(D ‖ i) + b
pub fn derive_secret_key(derivation: &KeyDerivation, output_index: usize, base: &SecretKey) -> Result<SecretKey> {
    let base = to_scalar(base)?;
    let tweak = Scalar::from(derivation_to_scalar(derivation, output_index));
    let derived = base.add_tweak(&tweak).map_err(crypto_error)?;
    Ok(SecretKey(derived.secret_bytes()))
}

/// GenerateKeyImage: I = x·Hp(P)
pub fn generate_key_image(public_key: &PublicKey, secret_key: &SecretKey) -> Result<KeyImage> {
    let scalar = to_scalar(secret_key)?;
    let image = hash_to_point(&public_key.0)
        .mul_tweak(secp(), &Scalar::from(scalar))
        .map_err(crypto_error)?;
    Ok(KeyImage(image.serialize()))
}

/// Key images must be group elements; secp256k1 has cofactor 1, so any valid
/// point lies in the prime-order subgroup.
pub fn is_valid_key_image(key_image: &KeyImage) -> bool {
    secp256k1::PublicKey::from_slice(&key_image.0).is_ok()
}

/// r·G + c·P
fn combine_base(r: &secp256k1::SecretKey, c: &secp256k1::SecretKey, p: &secp256k1::PublicKey) -> Result<secp256k1::PublicKey> {
    let r_g = secp256k1::PublicKey::from_secret_key(secp(), r);
    let c_p = p.mul_tweak(secp(), &Scalar::from(*c)).map_err(crypto_error)?;
    r_g.combine(&c_p).map_err(crypto_error)
}

/// r·H + c·I
fn combine_point(
    r: &secp256k1::SecretKey,
    h: &secp256k1::PublicKey,
    c: &secp256k1::SecretKey,
    image: &secp256k1::PublicKey,
) -> Result<secp256k1::PublicKey> {
    let r_h = h.mul_tweak(secp(), &Scalar::from(*r)).map_err(crypto_error)?;
    let c_i = image.mul_tweak(secp(), &Scalar::from(*c)).map_err(crypto_error)?;
    r_h.combine(&c_i).map_err(crypto_error)
}

fn add_scalars(sum: Option<secp256k1::SecretKey>, value: secp256k1::SecretKey) -> Result<secp256k1::SecretKey> {
    match sum {
        None => Ok(value),
        Some(sum) => sum.add_tweak(&Scalar::from(value)).map_err(crypto_error),
    }
}

fn signature_bytes(c: &secp256k1::SecretKey, r: &secp256k1::SecretKey) -> Signature {
    let mut bytes = [0u8; 64];
    bytes[..32].copy_from_slice(&c.secret_bytes());
    bytes[32..].copy_from_slice(&r.secret_bytes());
    Signature(bytes)
}

/// GenerateRingSignature
///
/// For every ring member `i ≠ s` pick `(cᵢ, rᵢ)` and compute
/// `Lᵢ = rᵢ·G + cᵢ·Pᵢ`, `Rᵢ = rᵢ·Hp(Pᵢ) + cᵢ·I`. The signer uses
/// `L_s = k·G`, `R_s = k·Hp(P_s)` and closes the ring with
/// `c_s = Hs(prefix ‖ L ‖ R) − Σcᵢ`, `r_s = k − c_s·x`.
pub fn generate_ring_signature(
    prefix_hash: &Hash,
    key_image: &KeyImage,
    ring: &[PublicKey],
    secret_key: &SecretKey,
    real_index: usize,
) -> Result<Vec<Signature>> {
    if real_index >= ring.len() {
        return Err(ConsensusError::Crypto(format!(
            "real output index {} outside ring of {}",
            real_index,
            ring.len()
        )));
    }
    if secret_key_to_public_key(secret_key)? != ring[real_index] {
        return Err(ConsensusError::Crypto("secret key does not own the real ring member".to_string()));
    }

    let x = to_scalar(secret_key)?;
    let image = to_point(&key_image.0)?;

    let mut seed = Vec::with_capacity(32 + 32 + 33 + 16);
    seed.extend_from_slice(b"ring-signature-nonce");
    seed.extend_from_slice(&x.secret_bytes());
    seed.extend_from_slice(prefix_hash);
    seed.extend_from_slice(&key_image.0);
    let seed = fast_hash(&seed);
    let nonce = |label: u8, index: usize| {
        let mut data = seed.to_vec();
        data.push(label);
        data.extend_from_slice(&(index as u64).to_le_bytes());
        hash_to_scalar(&data)
    };

    let mut buffer = Vec::with_capacity(32 + ring.len() * 66);
    buffer.extend_from_slice(prefix_hash);

    let k = nonce(b'k', real_index);
    let mut decoys = Vec::with_capacity(ring.len());
    let mut sum = None;
    for (i, member) in ring.iter().enumerate() {
        let p = to_point(&member.0)?;
        let h = hash_to_point(&member.0);
        if i == real_index {
            let l = secp256k1::PublicKey::from_secret_key(secp(), &k);
            let r = h.mul_tweak(secp(), &Scalar::from(k)).map_err(crypto_error)?;
            buffer.extend_from_slice(&l.serialize());
            buffer.extend_from_slice(&r.serialize());
            decoys.push(None);
        } else {
            let c = nonce(b'c', i);
            let r = nonce(b'r', i);
            buffer.extend_from_slice(&combine_base(&r, &c, &p)?.serialize());
            buffer.extend_from_slice(&combine_point(&r, &h, &c, &image)?.serialize());
            sum = Some(add_scalars(sum, c)?);
            decoys.push(Some((c, r)));
        }
    }

    let challenge = hash_to_scalar(&buffer);
    let c_real = match sum {
        None => challenge,
        Some(sum) => challenge.add_tweak(&Scalar::from(sum.negate())).map_err(crypto_error)?,
    };
    let c_x = c_real.mul_tweak(&Scalar::from(x)).map_err(crypto_error)?;
    let r_real = k.add_tweak(&Scalar::from(c_x.negate())).map_err(crypto_error)?;

    Ok(decoys
        .into_iter()
        .map(|decoy| match decoy {
            Some((c, r)) => signature_bytes(&c, &r),
            None => signature_bytes(&c_real, &r_real),
        })
        .collect())
}

/// CheckRingSignature: ℍ × 𝕀 × 𝒫* × 𝒮ig* → {true, false}
///
/// Holds iff `Σcᵢ = Hs(prefix ‖ L ‖ R)` with every `Lᵢ, Rᵢ` recomputed from the signature.
pub fn check_ring_signature(
    prefix_hash: &Hash,
    key_image: &KeyImage,
    ring: &[PublicKey],
    signatures: &[Signature],
) -> bool {
    if ring.is_empty() || ring.len() != signatures.len() {
        return false;
    }
    verify_ring(prefix_hash, key_image, ring, signatures).unwrap_or(false)
}

fn verify_ring(prefix_hash: &Hash, key_image: &KeyImage, ring: &[PublicKey], signatures: &[Signature]) -> Result<bool> {
    let image = to_point(&key_image.0)?;

    let mut buffer = Vec::with_capacity(32 + ring.len() * 66);
    buffer.extend_from_slice(prefix_hash);

    let mut sum = None;
    for (member, signature) in ring.iter().zip(signatures) {
        let p = to_point(&member.0)?;
        let h = hash_to_point(&member.0);
        let c = secp256k1::SecretKey::from_slice(&signature.0[..32]).map_err(crypto_error)?;
        let r = secp256k1::SecretKey::from_slice(&signature.0[32..]).map_err(crypto_error)?;
        buffer.extend_from_slice(&combine_base(&r, &c, &p)?.serialize());
        buffer.extend_from_slice(&combine_point(&r, &h, &c, &image)?.serialize());
        sum = Some(add_scalars(sum, c)?);
    }

    let challenge = hash_to_scalar(&buffer);
    Ok(sum.map(|sum| sum.secret_bytes() == challenge.secret_bytes()).unwrap_or(false))
}
