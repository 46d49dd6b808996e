use std::fmt;

use crate::error::StatsError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorDesc {
    shape: Vec<usize>,
}

impl TensorDesc {
    pub fn new(shape: Vec<usize>) -> Self {
        Self { shape }
    }

    pub fn new_vector(length: usize) -> Self {
        Self::new(vec![length])
    }

    pub fn new_matrix(rows: usize, cols: usize) -> Self {
        Self::new(vec![rows, cols])
    }

    pub fn new_tensor4d(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self::new(vec![batch, channels, height, width])
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.num_elements() * std::mem::size_of::<f32>()
    }

    pub fn dims(&self) -> &[usize] {
        &self.shape
    }

    // Kernels chunk their buffers by these extents, so none may be zero
    fn check_non_empty(&self) -> Result<(), StatsError> {
        if self.shape.contains(&0) {
            return Err(StatsError::ShapeMismatch(format!(
                "zero-sized dimension in {}",
                self
            )));
        }
        Ok(())
    }

    // (batch, channels, height, width) of an NCHW tensor
    pub fn as_nchw(&self) -> Result<(usize, usize, usize, usize), StatsError> {
        self.check_non_empty()?;
        match self.shape.as_slice() {
            &[n, c, h, w] => Ok((n, c, h, w)),
            _ => Err(StatsError::ShapeMismatch(format!(
                "expected 4D NCHW tensor, got {}",
                self
            ))),
        }
    }

    pub fn as_matrix(&self) -> Result<(usize, usize), StatsError> {
        self.check_non_empty()?;
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            _ => Err(StatsError::ShapeMismatch(format!(
                "expected 2D matrix, got {}",
                self
            ))),
        }
    }
}

impl From<Vec<usize>> for TensorDesc {
    fn from(shape: Vec<usize>) -> Self {
        Self::new(shape)
    }
}

impl<const N: usize> From<[usize; N]> for TensorDesc {
    fn from(shape: [usize; N]) -> Self {
        Self::new(shape.to_vec())
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self.shape
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("×");
        write!(f, "{}", dims)
    }
}
