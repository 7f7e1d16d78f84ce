//! Shape handling for view requests.

use crate::error::{RemoteTensorError, Result};

/// Resolves a requested shape that may contain one `-1` against `numel`
/// elements.
pub fn infer_size(requested: &[isize], numel: usize) -> Result<Vec<usize>> {
    let reshape_error = || RemoteTensorError::ReshapeError(vec![numel], requested.to_vec());

    let mut inferred = None;
    let mut known: usize = 1;
    let mut shape = Vec::with_capacity(requested.len());

    for (axis, &dim) in requested.iter().enumerate() {
        match dim {
            -1 => {
                if inferred.replace(axis).is_some() {
                    return Err(RemoteTensorError::invalid_shape("only one dimension can be inferred"));
                }
                shape.push(0);
            }
            d if d >= 0 => {
                let d = d as usize;
                known = known.checked_mul(d).ok_or_else(reshape_error)?;
                shape.push(d);
            }
            d => {
                return Err(RemoteTensorError::invalid_shape(format!("invalid shape dimension {d}")));
            }
        }
    }

    match inferred {
        Some(axis) => {
            if known == 0 || numel % known != 0 {
                return Err(reshape_error());
            }
            shape[axis] = numel / known;
        }
        None if known != numel => return Err(reshape_error()),
        None => {}
    }
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_size() {
        assert_eq!(infer_size(&[-1, 12], 24).unwrap(), vec![2, 12]);
        assert_eq!(infer_size(&[6, -1], 24).unwrap(), vec![6, 4]);
        assert_eq!(infer_size(&[2, -1, 2], 24).unwrap(), vec![2, 6, 2]);
        assert_eq!(infer_size(&[3, 4], 12).unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_infer_size_errors() {
        assert!(infer_size(&[5, 5], 12).is_err());
        assert!(infer_size(&[-1, -1], 12).is_err());
        assert!(infer_size(&[5, -1], 12).is_err());
        assert!(infer_size(&[-2, 6], 12).is_err());
    }
}
