//! FastLZ block format (levels 1 and 2).
//!
//! A block is a sequence of instructions. The top three bits of the first byte
//! carry the level. An instruction byte below 32 starts a literal run of
//! `ctrl + 1` bytes; anything else is a back reference whose length sits in
//! the top three bits (7 meaning "extended") and whose distance is split
//! between the low five bits and the following byte.

use crate::error::{FormatError, Result};

const MAX_COPY: usize = 32;
const MAX_LEN: usize = 264;
const MAX_L1_DISTANCE: usize = 8192;
const MAX_L2_DISTANCE: usize = 8191;
const HASH_LOG: u32 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    One,
    Two,
}

/// Decompresses a FastLZ block that must expand to exactly `expected_len`
/// bytes.
pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let Some(&first) = input.first() else {
        if expected_len == 0 {
            return Ok(Vec::new());
        }
        return Err(FormatError::DecompressionSizeMismatch {
            expected: expected_len,
            actual: 0,
        });
    };
    let level = match first >> 5 {
        0 => Level::One,
        1 => Level::Two,
        other => {
            return Err(FormatError::Compression(format!(
                "unsupported FastLZ level {}",
                other + 1
            )));
        }
    };
    decode(input, expected_len, level)
}

fn decode(input: &[u8], expected_len: usize, level: Level) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::with_capacity(expected_len);
    let mut ip = 1;
    let mut ctrl = usize::from(input[0] & 31);

    let truncated = |produced: usize| FormatError::DecompressionSizeMismatch {
        expected: expected_len,
        actual: produced,
    };

    loop {
        if ctrl >= 32 {
            let mut len = (ctrl >> 5) - 1;
            let ofs = (ctrl & 31) << 8;
            let mut next = |produced: usize| -> Result<usize> {
                let b = *input.get(ip).ok_or_else(|| truncated(produced))?;
                ip += 1;
                Ok(usize::from(b))
            };

            let distance = match level {
                Level::One => {
                    if len == 6 {
                        len += next(out.len())?;
                    }
                    ofs + next(out.len())? + 1
                }
                Level::Two => {
                    if len == 6 {
                        loop {
                            let code = next(out.len())?;
                            len += code;
                            if code != 255 {
                                break;
                            }
                        }
                    }
                    let code = next(out.len())?;
                    if code == 255 && ofs == 31 << 8 {
                        let far = (next(out.len())? << 8) + next(out.len())?;
                        far + MAX_L2_DISTANCE + 1
                    } else {
                        ofs + code + 1
                    }
                }
            };
            len += 3;

            if distance > out.len() {
                return Err(FormatError::Compression(format!(
                    "back reference {distance} bytes before position {}",
                    out.len()
                )));
            }
            if out.len() + len > expected_len {
                return Err(truncated(out.len() + len));
            }
            let start = out.len() - distance;
            // byte by byte: source and destination may overlap
            for i in 0..len {
                let b = out[start + i];
                out.push(b);
            }
        } else {
            let run = ctrl + 1;
            if ip + run > input.len() {
                return Err(truncated(out.len() + (input.len() - ip)));
            }
            if out.len() + run > expected_len {
                return Err(truncated(out.len() + run));
            }
            out.extend_from_slice(&input[ip..ip + run]);
            ip += run;
        }

        if ip >= input.len() {
            break;
        }
        ctrl = usize::from(input[ip]);
        ip += 1;
    }

    if out.len() != expected_len {
        return Err(truncated(out.len()));
    }
    Ok(out)
}

/// Compresses `input` into a level 1 FastLZ block.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / MAX_COPY + 1);
    if input.is_empty() {
        return out;
    }

    let mut table = vec![usize::MAX; 1 << HASH_LOG];
    let mut literal_start = 0;
    let mut ip = 0;

    while ip + 3 <= input.len() {
        let slot = hash(&input[ip..ip + 3]);
        let candidate = table[slot];
        table[slot] = ip;

        let matched = candidate != usize::MAX
            && ip - candidate <= MAX_L1_DISTANCE
            && input[candidate..candidate + 3] == input[ip..ip + 3];
        if !matched {
            ip += 1;
            continue;
        }

        let limit = (input.len() - ip).min(MAX_LEN);
        let mut len = 3;
        while len < limit && input[candidate + len] == input[ip + len] {
            len += 1;
        }

        emit_literals(&mut out, &input[literal_start..ip]);
        emit_match(&mut out, len, ip - candidate - 1);
        ip += len;
        literal_start = ip;
    }

    emit_literals(&mut out, &input[literal_start..]);
    out
}

fn hash(bytes: &[u8]) -> usize {
    let v = u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16;
    (v.wrapping_mul(2_654_435_769) >> (32 - HASH_LOG)) as usize
}

fn emit_literals(out: &mut Vec<u8>, literals: &[u8]) {
    for run in literals.chunks(MAX_COPY) {
        out.push((run.len() - 1) as u8);
        out.extend_from_slice(run);
    }
}

fn emit_match(out: &mut Vec<u8>, len: usize, distance: usize) {
    if len < 9 {
        out.push((((len - 2) << 5) | (distance >> 8)) as u8);
    } else {
        out.push(((7 << 5) | (distance >> 8)) as u8);
        out.push((len - 9) as u8);
    }
    out.push((distance & 255) as u8);
}
