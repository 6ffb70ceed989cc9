//! Axis-permutation kernel.

/// Reorder a contiguous row-major array by an axis permutation.
///
/// `dims`/`in_strides` describe the input layout, `out_strides` the permuted
/// layout, `order[k]` the input axis feeding output axis `k`. One thread per
/// element.
///
/// Dispatch: grid = ceil(n/256), block = 256.
pub const PERMUTE_CUDA: &str = r#"
extern "C" __global__ void permute_nd(
    const $T$* __restrict__ in,
    $T$* __restrict__ out,
    const unsigned int* __restrict__ dims,
    const unsigned int* __restrict__ in_strides,
    const unsigned int* __restrict__ out_strides,
    const unsigned int* __restrict__ order,
    const unsigned int ndim,
    const unsigned int n)
{
    unsigned int lin = blockIdx.x * blockDim.x + threadIdx.x;
    if (lin >= n) return;

    unsigned int dst = 0;
    for (unsigned int k = 0; k < ndim; k++) {
        unsigned int a = order[k];
        unsigned int c = (lin / in_strides[a]) % dims[a];
        dst += c * out_strides[k];
    }
    out[dst] = in[lin];
}
"#;
