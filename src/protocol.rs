use anyhow::{anyhow, Context, Error};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::effect::{EffectRequest, EffectResponse};

/// Longest request line we are willing to buffer
const MAX_LINE: usize = 4096;

/// Newline delimited JSON: one [`EffectRequest`] per line in, one [`EffectResponse`] per line out.
#[derive(Debug, Default)]
pub struct EffectCodec;

impl EffectCodec {
    pub fn new() -> EffectCodec {
        EffectCodec
    }
}

impl Decoder for EffectCodec {
    type Item = EffectRequest;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<EffectRequest>, Error> {
        loop {
            let newline = match src.iter().position(|byte| *byte == b'\n') {
                Some(newline) if newline <= MAX_LINE => newline,
                None if src.len() <= MAX_LINE => {
                    // We don't have a full line yet
                    return Ok(None);
                }
                _ => return Err(anyhow!("Request line longer than {} bytes", MAX_LINE)),
            };

            let line = src.split_to(newline);
            src.advance(1);

            let line = trim(&line);
            if line.is_empty() {
                continue;
            }

            let request = serde_json::from_slice(line)
                .context("Error while parsing effect request JSON")?;

            return Ok(Some(request));
        }
    }
}

impl Encoder<EffectResponse> for EffectCodec {
    type Error = Error;

    fn encode(&mut self, item: EffectResponse, dst: &mut BytesMut) -> Result<(), Error> {
        let payload = serde_json::to_vec(&item)?;

        dst.reserve(payload.len() + 1);
        dst.put_slice(&payload);
        dst.put_u8(b'\n');

        Ok(())
    }
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(start, |end| end + 1);

    &line[start..end]
}
