// Rask Program Serialization
// Compiled programs round-trip through a tagged container so generated code
// can be cached on disk and reloaded without recompiling.

use crate::compiler::unit::Program;
use crate::error::{ErrorKind, RaskError, RaskResult};

/// Container magic, first four bytes of every serialized program.
pub const MAGIC: &[u8; 4] = b"RASK";

/// Container format version. Bumped whenever the instruction set or the
/// constant-pool layout changes shape.
pub const VERSION: u8 = 1;

/// Serialize a compiled program into the tagged container format.
pub fn serialize(program: &Program) -> RaskResult<Vec<u8>> {
    let payload = serde_json::to_vec(program).map_err(|e| {
        RaskError::raised(
            ErrorKind::InternalError,
            format!("failed to serialize program: {}", e),
        )
    })?;
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Deserialize a program from the tagged container format.
pub fn deserialize(bytes: &[u8]) -> RaskResult<Program> {
    if bytes.len() < MAGIC.len() + 1 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(RaskError::raised(
            ErrorKind::RuntimeError,
            "not a rask program: bad magic",
        ));
    }
    let version = bytes[MAGIC.len()];
    if version != VERSION {
        return Err(RaskError::raised(
            ErrorKind::RuntimeError,
            format!(
                "unsupported program version {} (expected {})",
                version, VERSION
            ),
        ));
    }
    serde_json::from_slice(&bytes[MAGIC.len() + 1..]).map_err(|e| {
        RaskError::raised(
            ErrorKind::RuntimeError,
            format!("corrupt program payload: {}", e),
        )
    })
}
