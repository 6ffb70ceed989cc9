//! Sampling-pattern gather/scatter kernels.

/// Gather retained samples: `out[j] (+)= in[idx[j]]`.
///
/// Dispatch: grid = ceil(n/256), block = 256.
pub const GATHER_REAL_CUDA: &str = r#"
extern "C" __global__ void gather_real(
    const $T$* __restrict__ in, const unsigned int in_off,
    const unsigned int* __restrict__ idx,
    $T$* __restrict__ out, const unsigned int out_off,
    const unsigned int n, const int acc)
{
    unsigned int j = blockIdx.x * blockDim.x + threadIdx.x;
    if (j >= n) return;

    $T$ v = in[in_off + idx[j]];
    out[out_off + j] = acc ? (out[out_off + j] + v) : v;
}
"#;

/// Complex gather.
pub const GATHER_COMPLEX_CUDA: &str = r#"
extern "C" __global__ void gather_complex(
    const $T$* __restrict__ in, const unsigned int in_off,
    const unsigned int* __restrict__ idx,
    $T$* __restrict__ out, const unsigned int out_off,
    const unsigned int n, const int acc)
{
    unsigned int j = blockIdx.x * blockDim.x + threadIdx.x;
    if (j >= n) return;

    $T$ v = in[in_off + idx[j]];
    if (acc) {
        out[out_off + j].x += v.x;
        out[out_off + j].y += v.y;
    } else {
        out[out_off + j] = v;
    }
}
"#;

/// Scatter compact samples back to full positions: `out[idx[j]] (+)= in[j]`.
/// Indices are assumed distinct; duplicate indices race.
///
/// Dispatch: grid = ceil(n/256), block = 256.
pub const SCATTER_REAL_CUDA: &str = r#"
extern "C" __global__ void scatter_real(
    const $T$* __restrict__ in, const unsigned int in_off,
    const unsigned int* __restrict__ idx,
    $T$* __restrict__ out, const unsigned int out_off,
    const unsigned int n, const int acc)
{
    unsigned int j = blockIdx.x * blockDim.x + threadIdx.x;
    if (j >= n) return;

    $T$ v = in[in_off + j];
    unsigned int d = out_off + idx[j];
    out[d] = acc ? (out[d] + v) : v;
}
"#;

/// Complex scatter.
pub const SCATTER_COMPLEX_CUDA: &str = r#"
extern "C" __global__ void scatter_complex(
    const $T$* __restrict__ in, const unsigned int in_off,
    const unsigned int* __restrict__ idx,
    $T$* __restrict__ out, const unsigned int out_off,
    const unsigned int n, const int acc)
{
    unsigned int j = blockIdx.x * blockDim.x + threadIdx.x;
    if (j >= n) return;

    $T$ v = in[in_off + j];
    unsigned int d = out_off + idx[j];
    if (acc) {
        out[d].x += v.x;
        out[d].y += v.y;
    } else {
        out[d] = v;
    }
}
"#;
