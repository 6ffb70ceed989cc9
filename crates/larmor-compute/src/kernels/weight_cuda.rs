//! Element-wise sensitivity weighting kernels.

/// Real-valued weighting: `out[i] (+)= in[i] * w[i]`.
///
/// Dispatch: grid = ceil(n/256), block = 256.
pub const WEIGHT_REAL_CUDA: &str = r#"
extern "C" __global__ void weight_real(
    const $T$* __restrict__ in, const unsigned int in_off,
    const $T$* __restrict__ w, const unsigned int w_off,
    $T$* __restrict__ out, const unsigned int out_off,
    const unsigned int n, const int acc)
{
    unsigned int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i >= n) return;

    $T$ v = in[in_off + i] * w[w_off + i];
    out[out_off + i] = acc ? (out[out_off + i] + v) : v;
}
"#;

/// Complex weighting with optional conjugation of the weight:
/// `out[i] (+)= in[i] * (conj ? conj(w[i]) : w[i])`.
///
/// Dispatch: grid = ceil(n/256), block = 256.
pub const WEIGHT_COMPLEX_CUDA: &str = r#"
extern "C" __global__ void weight_complex(
    const $T$* __restrict__ in, const unsigned int in_off,
    const $T$* __restrict__ w, const unsigned int w_off,
    $T$* __restrict__ out, const unsigned int out_off,
    const unsigned int n, const int conj, const int acc)
{
    unsigned int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i >= n) return;

    $T$ a = in[in_off + i];
    $T$ b = w[w_off + i];
    $R$ by = conj ? -b.y : b.y;

    $T$ v;
    v.x = a.x * b.x - a.y * by;
    v.y = a.x * by + a.y * b.x;

    if (acc) {
        out[out_off + i].x += v.x;
        out[out_off + i].y += v.y;
    } else {
        out[out_off + i] = v;
    }
}
"#;
