use serde_json::Value;

/// Block whose state a recorded request is re-executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedBlock {
    pub number: u64,
    /// `false` for requests against the pending block, whose state was never archived.
    pub validatable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot decode block tag '{0}' as a hex block number")]
pub struct BlockTagError(pub String);

/// Resolves the requested block from the last parameter of a request.
///
/// Requests with fewer than two parameters, or whose last parameter is not a string,
/// target the recorded block.
pub fn resolve_requested_block(
    params: &[Value],
    recorded_block: u64,
) -> Result<RequestedBlock, BlockTagError> {
    let recorded = RequestedBlock {
        number: recorded_block,
        validatable: true,
    };
    if params.len() < 2 {
        return Ok(recorded);
    }
    let Some(Value::String(tag)) = params.last() else {
        return Ok(recorded);
    };
    match tag.as_str() {
        "latest" => Ok(recorded),
        "pending" => Ok(RequestedBlock {
            validatable: false,
            ..recorded
        }),
        "earliest" => Ok(RequestedBlock {
            number: 0,
            validatable: true,
        }),
        other => parse_hex_block(other)
            .map(|number| RequestedBlock {
                number,
                validatable: true,
            })
            .ok_or_else(|| BlockTagError(other.to_owned())),
    }
}

fn parse_hex_block(tag: &str) -> Option<u64> {
    let digits = tag.strip_prefix("0x").or_else(|| tag.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
