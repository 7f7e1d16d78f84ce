//! Tensor layouts and memory formats.

use std::fmt;

/// Physical layout of a tensor. Remote tensors are always strided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Strided,
    SparseCoo,
    SparseCsr,
    Mkldnn,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layout::Strided => "strided",
            Layout::SparseCoo => "sparse_coo",
            Layout::SparseCsr => "sparse_csr",
            Layout::Mkldnn => "mkldnn",
        };
        f.write_str(name)
    }
}

/// Dimension ordering used to derive strides for a freshly allocated tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryFormat {
    #[default]
    Contiguous,
    /// NHWC for 4-d tensors.
    ChannelsLast,
    /// NDHWC for 5-d tensors.
    ChannelsLast3d,
    /// Keep the format of an input tensor; meaningless for empty construction.
    Preserve,
}
