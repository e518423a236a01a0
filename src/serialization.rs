//! Binary codec for transactions, block templates and chain positions
//!
//! Integers are LEB128 varints unless noted. Layouts:
//!
//! - transaction prefix: `version:u8 ‖ unlock ‖ #inputs ‖ inputs ‖ #outputs ‖ outputs ‖ #extra ‖ extra`
//! - base input: `0xff ‖ block_index`; key input: `0x02 ‖ amount ‖ #offsets ‖ offsets ‖ key_image[33]`
//! - output: `amount ‖ 0x02 ‖ key[33]`
//! - transaction: `prefix ‖ #groups ‖ (#sigs ‖ sigs[64]*)*`
//! - block template: `major:u8 ‖ minor:u8 ‖ timestamp ‖ prev[32] ‖ nonce:u32le ‖ flag:u8 [‖ static[32]] ‖ base tx ‖ #hashes ‖ hashes[32]*`

use crate::constants::{TX_INPUT_TAG_BASE, TX_INPUT_TAG_KEY, TX_OUTPUT_TAG_KEY};
use crate::error::DecodeError;
use crate::position::BlockHeight;
use crate::types::*;

/// Values with a canonical binary form
pub trait BinarySerialize: Sized {
    fn encode(&self, out: &mut Vec<u8>);
    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, DecodeError>;
}

/// Encode a value into a fresh buffer
pub fn to_binary_array<T: BinarySerialize>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.encode(&mut out);
    out
}

/// Decode a value that must span the whole buffer
pub fn from_binary_array<T: BinarySerialize>(data: &[u8]) -> Result<T, DecodeError> {
    let mut reader = BinaryReader::new(data);
    let value = T::decode(&mut reader)?;
    match reader.remaining() {
        0 => Ok(value),
        trailing => Err(DecodeError::TrailingBytes(trailing)),
    }
}

/// Encode a number as a LEB128 varint
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Cursor over an input buffer
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BinaryReader { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.position).ok_or(DecodeError::UnexpectedEof)?;
        self.position += 1;
        Ok(byte)
    }

    pub fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.read_slice(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(slice);
        Ok(bytes)
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Reads a varint in its shortest form; padded encodings such as
    /// `0x80 0x00` are rejected so every value has exactly one encoding
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            let bits = u64::from(byte & 0x7f);
            if shift == 63 && bits > 1 {
                return Err(DecodeError::VarintOverflow);
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                if byte == 0 && shift > 0 {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(DecodeError::VarintOverflow);
            }
        }
    }

    pub fn read_varint_u32(&mut self) -> Result<u32, DecodeError> {
        u32::try_from(self.read_varint()?).map_err(|_| DecodeError::VarintOverflow)
    }

    /// Element count, bounded by the bytes left so garbage cannot force huge allocations
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let length = self.read_varint()?;
        if length > self.remaining() as u64 {
            return Err(DecodeError::LengthOutOfRange(length));
        }
        Ok(length as usize)
    }
}

impl BinarySerialize for BlockHeight {
    fn encode(&self, out: &mut Vec<u8>) {
        write_varint(out, u64::from(self.native()));
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        let wire = reader.read_varint()?;
        let wire = u32::try_from(wire).map_err(|_| DecodeError::HeightOutOfRange(wire))?;
        BlockHeight::try_from(wire)
    }
}

impl BinarySerialize for TransactionInput {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            TransactionInput::Base(input) => {
                out.push(TX_INPUT_TAG_BASE);
                write_varint(out, u64::from(input.block_index));
            }
            TransactionInput::Key(input) => {
                out.push(TX_INPUT_TAG_KEY);
                write_varint(out, input.amount);
                write_varint(out, input.output_indexes.len() as u64);
                for index in &input.output_indexes {
                    write_varint(out, u64::from(*index));
                }
                out.extend_from_slice(&input.key_image.0);
            }
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            TX_INPUT_TAG_BASE => Ok(TransactionInput::Base(BaseInput {
                block_index: reader.read_varint_u32()?,
            })),
            TX_INPUT_TAG_KEY => {
                let amount = reader.read_varint()?;
                let count = reader.read_length()?;
                let mut output_indexes = Vec::with_capacity(count);
                for _ in 0..count {
                    output_indexes.push(reader.read_varint_u32()?);
                }
                let key_image = KeyImage(reader.read_bytes()?);
                Ok(TransactionInput::Key(KeyInput {
                    amount,
                    output_indexes,
                    key_image,
                }))
            }
            tag => Err(DecodeError::UnknownInputTag(tag)),
        }
    }
}

impl BinarySerialize for TransactionOutput {
    fn encode(&self, out: &mut Vec<u8>) {
        write_varint(out, self.amount);
        out.push(TX_OUTPUT_TAG_KEY);
        out.extend_from_slice(&self.key.0);
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        let amount = reader.read_varint()?;
        match reader.read_u8()? {
            TX_OUTPUT_TAG_KEY => Ok(TransactionOutput {
                amount,
                key: PublicKey(reader.read_bytes()?),
            }),
            tag => Err(DecodeError::UnknownOutputTag(tag)),
        }
    }
}

/// Serialized prefix: everything a ring signature commits to
pub fn encode_transaction_prefix(tx: &Transaction, out: &mut Vec<u8>) {
    out.push(tx.version);
    write_varint(out, tx.unlock_time);
    write_varint(out, tx.inputs.len() as u64);
    for input in &tx.inputs {
        input.encode(out);
    }
    write_varint(out, tx.outputs.len() as u64);
    for output in &tx.outputs {
        output.encode(out);
    }
    write_varint(out, tx.extra.len() as u64);
    out.extend_from_slice(&tx.extra);
}

pub fn transaction_prefix_to_binary_array(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::new();
    encode_transaction_prefix(tx, &mut out);
    out
}

impl BinarySerialize for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_transaction_prefix(self, out);
        write_varint(out, self.signatures.len() as u64);
        for group in &self.signatures {
            write_varint(out, group.len() as u64);
            for signature in group {
                out.extend_from_slice(&signature.0);
            }
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        let version = reader.read_u8()?;
        let unlock_time = reader.read_varint()?;

        let input_count = reader.read_length()?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TransactionInput::decode(reader)?);
        }

        let output_count = reader.read_length()?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(TransactionOutput::decode(reader)?);
        }

        let extra_len = reader.read_length()?;
        let extra = reader.read_slice(extra_len)?.to_vec();

        let group_count = reader.read_length()?;
        let mut signatures = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            let count = reader.read_length()?;
            let mut group = Vec::with_capacity(count);
            for _ in 0..count {
                group.push(Signature(reader.read_bytes()?));
            }
            signatures.push(group);
        }

        Ok(Transaction {
            version,
            unlock_time,
            inputs,
            outputs,
            extra,
            signatures,
        })
    }
}

/// Header part of a block template
pub fn encode_block_header(block: &BlockTemplate, out: &mut Vec<u8>) {
    out.push(block.major_version);
    out.push(block.minor_version);
    write_varint(out, block.timestamp);
    out.extend_from_slice(&block.previous_block_hash);
    out.extend_from_slice(&block.nonce.to_le_bytes());
    match &block.static_reward_hash {
        Some(hash) => {
            out.push(1);
            out.extend_from_slice(hash);
        }
        None => out.push(0),
    }
}

impl BinarySerialize for BlockTemplate {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_block_header(self, out);
        self.base_transaction.encode(out);
        write_varint(out, self.transaction_hashes.len() as u64);
        for hash in &self.transaction_hashes {
            out.extend_from_slice(hash);
        }
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        let major_version = reader.read_u8()?;
        let minor_version = reader.read_u8()?;
        let timestamp = reader.read_varint()?;
        let previous_block_hash = reader.read_bytes()?;
        let nonce = u32::from_le_bytes(reader.read_bytes()?);
        let static_reward_hash = match reader.read_u8()? {
            0 => None,
            1 => Some(reader.read_bytes()?),
            flag => return Err(DecodeError::InvalidFlag(flag)),
        };
        let base_transaction = Transaction::decode(reader)?;
        let count = reader.read_length()?;
        let mut transaction_hashes = Vec::with_capacity(count);
        for _ in 0..count {
            transaction_hashes.push(reader.read_bytes()?);
        }
        Ok(BlockTemplate {
            major_version,
            minor_version,
            timestamp,
            previous_block_hash,
            nonce,
            static_reward_hash,
            base_transaction,
            transaction_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Transaction {
        Transaction {
            version: 1,
            unlock_time: 300,
            inputs: vec![
                TransactionInput::Key(KeyInput {
                    amount: 70_000,
                    output_indexes: vec![5, 1, 200],
                    key_image: KeyImage([3u8; 33]),
                }),
                TransactionInput::Base(BaseInput { block_index: 42 }),
            ],
            outputs: vec![TransactionOutput {
                amount: 60_000,
                key: PublicKey([2u8; 33]),
            }],
            extra: vec![1, 2, 3],
            signatures: vec![vec![Signature([9u8; 64]); 3], vec![]],
        }
    }

    // ============================================================================
    // VARINTS
    // ============================================================================

    #[test]
    fn test_varint_encoding() {
        let mut out = Vec::new();
        write_varint(&mut out, 0);
        write_varint(&mut out, 127);
        write_varint(&mut out, 128);
        write_varint(&mut out, 1_000_000);
        assert_eq!(out, vec![0x00, 0x7f, 0x80, 0x01, 0xc0, 0x84, 0x3d]);

        let mut reader = BinaryReader::new(&out);
        assert_eq!(reader.read_varint().unwrap(), 0);
        assert_eq!(reader.read_varint().unwrap(), 127);
        assert_eq!(reader.read_varint().unwrap(), 128);
        assert_eq!(reader.read_varint().unwrap(), 1_000_000);
    }

    #[test]
    fn test_varint_max_and_overflow() {
        let mut out = Vec::new();
        write_varint(&mut out, u64::MAX);
        assert_eq!(out.len(), 10);
        assert_eq!(BinaryReader::new(&out).read_varint().unwrap(), u64::MAX);

        let too_big = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        assert_eq!(BinaryReader::new(&too_big).read_varint(), Err(DecodeError::VarintOverflow));
        assert_eq!(BinaryReader::new(&[0x80]).read_varint(), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn test_padded_varints_rejected() {
        // Each of these decodes to a value that has a shorter encoding
        for padded in [&[0x80u8, 0x00][..], &[0xff, 0x00], &[0x80, 0x80, 0x00], &[0x81, 0x80, 0x00]] {
            assert_eq!(
                BinaryReader::new(padded).read_varint(),
                Err(DecodeError::NonCanonicalVarint),
                "{padded:02x?}"
            );
        }
        assert_eq!(BinaryReader::new(&[0x00]).read_varint().unwrap(), 0);
        assert_eq!(BinaryReader::new(&[0x80, 0x01]).read_varint().unwrap(), 128);
    }

    // ============================================================================
    // TRANSACTIONS
    // ============================================================================

    #[test]
    fn test_transaction_decode_matches_encode() {
        let tx = sample_transaction();
        let blob = to_binary_array(&tx);
        assert_eq!(from_binary_array::<Transaction>(&blob).unwrap(), tx);
        assert!(blob.starts_with(&transaction_prefix_to_binary_array(&tx)));
    }

    #[test]
    fn test_transaction_decode_failures() {
        let blob = to_binary_array(&sample_transaction());
        assert_eq!(
            from_binary_array::<Transaction>(&blob[..blob.len() - 1]),
            Err(DecodeError::UnexpectedEof)
        );

        let mut trailing = blob.clone();
        trailing.push(0);
        assert_eq!(from_binary_array::<Transaction>(&trailing), Err(DecodeError::TrailingBytes(1)));

        let unknown_input = [1u8, 0, 1, 0x07];
        assert_eq!(
            from_binary_array::<Transaction>(&unknown_input),
            Err(DecodeError::UnknownInputTag(0x07))
        );

        let huge_count = [1u8, 0, 0xff, 0xff, 0x03];
        assert!(matches!(
            from_binary_array::<Transaction>(&huge_count),
            Err(DecodeError::LengthOutOfRange(_))
        ));
    }

    // ============================================================================
    // CHAIN POSITIONS AND BLOCKS
    // ============================================================================

    #[test]
    fn test_block_height_wire_form() {
        assert_eq!(to_binary_array(&BlockHeight::NULL), vec![0]);
        assert_eq!(from_binary_array::<BlockHeight>(&[0]).unwrap(), BlockHeight::NULL);
        assert_eq!(
            from_binary_array::<BlockHeight>(&to_binary_array(&BlockHeight::from_native(300))).unwrap(),
            BlockHeight::from_native(300)
        );

        let mut max_u32 = Vec::new();
        write_varint(&mut max_u32, u64::from(u32::MAX));
        assert_eq!(
            from_binary_array::<BlockHeight>(&max_u32),
            Err(DecodeError::HeightOutOfRange(u64::from(u32::MAX)))
        );
    }

    #[test]
    fn test_block_template_decode_matches_encode() {
        let block = BlockTemplate {
            major_version: 1,
            minor_version: 2,
            timestamp: 1_544_396_293,
            previous_block_hash: [4u8; 32],
            nonce: 77,
            static_reward_hash: Some([5u8; 32]),
            base_transaction: sample_transaction(),
            transaction_hashes: vec![[6u8; 32], [7u8; 32]],
        };
        let blob = to_binary_array(&block);
        assert_eq!(from_binary_array::<BlockTemplate>(&blob).unwrap(), block);
    }

    #[test]
    fn test_block_template_flag_must_be_zero_or_one() {
        let block = BlockTemplate {
            major_version: 1,
            minor_version: 0,
            timestamp: 1_000,
            previous_block_hash: [4u8; 32],
            nonce: 1,
            static_reward_hash: None,
            base_transaction: sample_transaction(),
            transaction_hashes: vec![],
        };
        let mut header = Vec::new();
        encode_block_header(&block, &mut header);
        let flag_at = header.len() - 1;

        let mut blob = to_binary_array(&block);
        assert_eq!(blob[flag_at], 0);
        blob[flag_at] = 2;
        assert_eq!(from_binary_array::<BlockTemplate>(&blob), Err(DecodeError::InvalidFlag(2)));
    }
}
