/// Code of an internal server error.
pub const INTERNAL_ERROR: i32 = -32603;
/// Code of a request the node rejected as malformed.
pub const INVALID_ARGUMENT: i32 = -32602;

/// Live error messages accepted for a recorded error code.
///
/// A live error matches when its message contains any of the listed substrings.
pub fn accepted_messages(code: i32) -> Option<&'static [&'static str]> {
    match code {
        INTERNAL_ERROR | 3 => Some(&["execution reverted"]),
        -32000 => Some(&[
            "execution reverted",
            "invalid opcode",
            "invalid code",
            "insufficient balance for transfer",
            "insufficient funds",
            "gas required exceeds allowance",
            "out of gas",
        ]),
        INVALID_ARGUMENT => Some(&["invalid argument"]),
        _ => None,
    }
}

/// Whether `message` is one of the errors accepted for `code`.
pub fn is_accepted(code: i32, message: &str) -> bool {
    accepted_messages(code)
        .is_some_and(|accepted| accepted.iter().any(|expected| message.contains(expected)))
}

/// Human-readable form of what a recorded error code expects from the live side.
pub fn describe_expected(code: i32) -> String {
    match accepted_messages(code) {
        Some(accepted) => format!("one of these error messages: {}", accepted.join(" or ")),
        None => format!("unknown error code: {code}"),
    }
}
