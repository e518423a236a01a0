//! Transaction extra field
//!
//! The extra field is a sequence of tagged records:
//! - `0x00` padding, zero bytes up to the end of the field
//! - `0x01` transaction public key, 33 bytes
//! - `0x02` nonce, one length byte followed by the nonce; a nonce starting
//!   with `0x00` carries a 32-byte payment id

use crate::constants::*;
use crate::crypto::check_key;
use crate::error::ValidationError;
use crate::types::{PaymentId, PublicKey, NULL_HASH};

/// One parsed extra record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Padding(usize),
    PublicKey(PublicKey),
    Nonce(Vec<u8>),
}

/// Parses the extra field into records
pub fn parse_extra(extra: &[u8]) -> Result<Vec<ExtraField>, ValidationError> {
    let mut fields = Vec::new();
    let mut position = 0;
    while position < extra.len() {
        let tag = extra[position];
        position += 1;
        match tag {
            TX_EXTRA_TAG_PADDING => {
                let rest = &extra[position..];
                if rest.iter().any(|&b| b != 0) {
                    return Err(ValidationError::ExtraIllFormed);
                }
                fields.push(ExtraField::Padding(rest.len() + 1));
                position = extra.len();
            }
            TX_EXTRA_TAG_PUBKEY => {
                let bytes = extra
                    .get(position..position + PublicKey::LENGTH)
                    .ok_or(ValidationError::ExtraIllFormed)?;
                let mut key = [0u8; 33];
                key.copy_from_slice(bytes);
                fields.push(ExtraField::PublicKey(PublicKey(key)));
                position += PublicKey::LENGTH;
            }
            TX_EXTRA_TAG_NONCE => {
                let len = *extra.get(position).ok_or(ValidationError::ExtraIllFormed)? as usize;
                position += 1;
                let nonce = extra
                    .get(position..position + len)
                    .ok_or(ValidationError::ExtraIllFormed)?;
                fields.push(ExtraField::Nonce(nonce.to_vec()));
                position += len;
            }
            _ => return Err(ValidationError::ExtraIllFormed),
        }
    }
    Ok(fields)
}

/// Serializes records back into an extra field
pub fn write_extra(fields: &[ExtraField]) -> Vec<u8> {
    let mut extra = Vec::new();
    for field in fields {
        match field {
            ExtraField::Padding(len) => {
                extra.push(TX_EXTRA_TAG_PADDING);
                extra.extend(std::iter::repeat(0u8).take(len.saturating_sub(1)));
            }
            ExtraField::PublicKey(key) => {
                extra.push(TX_EXTRA_TAG_PUBKEY);
                extra.extend_from_slice(&key.0);
            }
            ExtraField::Nonce(nonce) => {
                extra.push(TX_EXTRA_TAG_NONCE);
                extra.push(nonce.len() as u8);
                extra.extend_from_slice(nonce);
            }
        }
    }
    extra
}

pub fn add_public_key(extra: &mut Vec<u8>, key: &PublicKey) {
    extra.push(TX_EXTRA_TAG_PUBKEY);
    extra.extend_from_slice(&key.0);
}

/// Appends a nonce record
pub fn add_nonce(extra: &mut Vec<u8>, nonce: &[u8]) -> Result<(), ValidationError> {
    if nonce.is_empty() || nonce.len() > MAX_EXTRA_NONCE_SIZE {
        return Err(ValidationError::ExtraIllFormed);
    }
    extra.push(TX_EXTRA_TAG_NONCE);
    extra.push(nonce.len() as u8);
    extra.extend_from_slice(nonce);
    Ok(())
}

/// Replaces any payment id nonce with `payment_id`
pub fn set_payment_id(extra: &mut Vec<u8>, payment_id: &PaymentId) -> Result<(), ValidationError> {
    let mut fields = parse_extra(extra)?;
    fields.retain(|field| !matches!(field, ExtraField::Nonce(nonce) if is_payment_id_nonce(nonce)));

    let mut nonce = Vec::with_capacity(33);
    nonce.push(TX_EXTRA_NONCE_PAYMENT_ID);
    nonce.extend_from_slice(payment_id);
    fields.push(ExtraField::Nonce(nonce));

    *extra = write_extra(&fields);
    Ok(())
}

fn is_payment_id_nonce(nonce: &[u8]) -> bool {
    nonce.first() == Some(&TX_EXTRA_NONCE_PAYMENT_ID)
}

/// First transaction public key in the extra, if the field parses
pub fn get_public_key(extra: &[u8]) -> Option<PublicKey> {
    parse_extra(extra).ok()?.into_iter().find_map(|field| match field {
        ExtraField::PublicKey(key) => Some(key),
        _ => None,
    })
}

/// Payment id carried in the extra, if any
pub fn get_payment_id(extra: &[u8]) -> Option<PaymentId> {
    parse_extra(extra).ok()?.into_iter().find_map(|field| match field {
        ExtraField::Nonce(nonce) if is_payment_id_nonce(&nonce) && nonce.len() == 33 => {
            let mut id = [0u8; 32];
            id.copy_from_slice(&nonce[1..]);
            Some(id)
        }
        _ => None,
    })
}

/// ValidateExtra
///
/// 1. Size must not exceed `max_size`
/// 2. Records must parse
/// 3. Exactly one transaction public key, and it must be a curve point
/// 4. Every nonce is non-empty; a payment id nonce is 33 bytes and not null
pub fn validate_extra(extra: &[u8], max_size: usize) -> Result<(), ValidationError> {
    if extra.len() > max_size {
        return Err(ValidationError::ExtraTooLarge);
    }
    let fields = parse_extra(extra)?;

    let mut public_key = None;
    for field in &fields {
        match field {
            ExtraField::PublicKey(key) => {
                if public_key.replace(key).is_some() {
                    return Err(ValidationError::ExtraDuplicatePublicKey);
                }
            }
            ExtraField::Nonce(nonce) => {
                if nonce.is_empty() {
                    return Err(ValidationError::ExtraIllFormed);
                }
                if is_payment_id_nonce(nonce) && (nonce.len() != 33 || nonce[1..] == NULL_HASH) {
                    return Err(ValidationError::ExtraInvalidPaymentId);
                }
            }
            ExtraField::Padding(_) => {}
        }
    }

    match public_key {
        None => Err(ValidationError::ExtraMissingPublicKey),
        Some(key) if !check_key(key) => Err(ValidationError::ExtraInvalidPublicKey),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_deterministic_keys;

    fn valid_key() -> PublicKey {
        generate_deterministic_keys(b"extra").public_key
    }

    #[test]
    fn test_parse_round_trip() {
        let mut extra = Vec::new();
        add_public_key(&mut extra, &valid_key());
        add_nonce(&mut extra, b"miner").unwrap();
        let fields = parse_extra(&extra).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(write_extra(&fields), extra);
        assert_eq!(get_public_key(&extra), Some(valid_key()));
    }

    #[test]
    fn test_padding_must_be_zero() {
        assert_eq!(parse_extra(&[0, 0, 0]).unwrap(), vec![ExtraField::Padding(3)]);
        assert_eq!(parse_extra(&[0, 0, 1]), Err(ValidationError::ExtraIllFormed));
    }

    #[test]
    fn test_truncated_records_are_ill_formed() {
        assert_eq!(parse_extra(&[TX_EXTRA_TAG_PUBKEY, 1, 2]), Err(ValidationError::ExtraIllFormed));
        assert_eq!(parse_extra(&[TX_EXTRA_TAG_NONCE, 5, 1]), Err(ValidationError::ExtraIllFormed));
        assert_eq!(parse_extra(&[0x7f]), Err(ValidationError::ExtraIllFormed));
    }

    #[test]
    fn test_payment_id_replaced() {
        let mut extra = Vec::new();
        add_public_key(&mut extra, &valid_key());
        set_payment_id(&mut extra, &[1u8; 32]).unwrap();
        set_payment_id(&mut extra, &[2u8; 32]).unwrap();
        assert_eq!(get_payment_id(&extra), Some([2u8; 32]));
        assert_eq!(parse_extra(&extra).unwrap().len(), 2);
    }

    #[test]
    fn test_validate_extra() {
        let mut extra = Vec::new();
        assert_eq!(validate_extra(&extra, 1024), Err(ValidationError::ExtraMissingPublicKey));

        add_public_key(&mut extra, &valid_key());
        assert_eq!(validate_extra(&extra, 1024), Ok(()));
        assert_eq!(validate_extra(&extra, 10), Err(ValidationError::ExtraTooLarge));

        let mut duplicate = extra.clone();
        add_public_key(&mut duplicate, &valid_key());
        assert_eq!(validate_extra(&duplicate, 1024), Err(ValidationError::ExtraDuplicatePublicKey));

        let mut invalid = Vec::new();
        add_public_key(&mut invalid, &PublicKey::default());
        assert_eq!(validate_extra(&invalid, 1024), Err(ValidationError::ExtraInvalidPublicKey));

        let mut null_payment_id = extra.clone();
        set_payment_id(&mut null_payment_id, &NULL_HASH).unwrap();
        assert_eq!(validate_extra(&null_payment_id, 1024), Err(ValidationError::ExtraInvalidPaymentId));

        let mut short_payment_id = extra.clone();
        add_nonce(&mut short_payment_id, &[TX_EXTRA_NONCE_PAYMENT_ID, 1, 2]).unwrap();
        assert_eq!(validate_extra(&short_payment_id, 1024), Err(ValidationError::ExtraInvalidPaymentId));
    }
}
