//! Undersampled reconstruction by plain gradient descent.
//!
//! Plays the role of the external iterative solver: repeated forward/adjoint
//! evaluations of a configured Cartesian sensitivity-encoding operator, with
//! the solver's own vector arithmetic kept host-side.

use std::sync::Arc;

use num_complex::Complex32;

use larmor_compute::{CpuDevice, DeviceArray, HostArray, Shape};
use larmor_sense::{CartesianSenseOperator, LinearOperator};

type C32 = Complex32;

fn upload(dev: &CpuDevice, data: Vec<C32>, dims: &[usize]) -> DeviceArray<C32, CpuDevice> {
    let host = HostArray::from_vec(data, Shape::from_slice(dims)).expect("example data");
    DeviceArray::from_host(dev, &host).expect("upload")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dev = CpuDevice::new();
    let n = 8usize;

    // Phantom: a bright square on an empty background.
    let mut truth_data = vec![C32::new(0.0, 0.0); n * n];
    for r in 2..6 {
        for c in 2..6 {
            truth_data[r * n + c] = C32::new(1.0, 0.0);
        }
    }
    let truth = upload(&dev, truth_data.clone(), &[n, n]);

    // Two coils with opposing smooth ramps.
    let mut maps = Vec::with_capacity(2 * n * n);
    let ramp = |p: usize| 0.5 * p as f32 / (n * n) as f32;
    for p in 0..n * n {
        maps.push(C32::new(0.5 + ramp(p), 0.0));
    }
    for p in 0..n * n {
        maps.push(C32::new(1.0 - ramp(p), 0.0));
    }
    let maps = Arc::new(upload(&dev, maps, &[n, n, 2]));

    // Retain three of every four k-space columns.
    let idx: Vec<u32> = (0..(n * n) as u32).filter(|p| p % 4 != 3).collect();
    let nsamp = idx.len();
    let idx_host = HostArray::from_vec(idx, Shape::from_slice(&[nsamp]))?;
    let idx = Arc::new(DeviceArray::from_host(&dev, &idx_host)?);

    let mut op = CartesianSenseOperator::new();
    op.set_sensitivity_maps(maps)?;
    op.set_sampling_indices(&dev, idx)?;

    // Simulated acquisition of the phantom.
    let mut acquired = DeviceArray::zeros(&dev, Shape::from_slice(&[nsamp, 2]))?;
    op.mult_m(&dev, &truth, &mut acquired, false)?;
    let acquired_host = acquired.to_host(&dev)?;

    // Gradient descent on ‖Ax − y‖²: x ← x + α·Aᴴ(y − Ax).
    let alpha = 0.35f32;
    let mut x = vec![C32::new(0.0, 0.0); n * n];
    for step in 0..60 {
        let x_dev = upload(&dev, x.clone(), &[n, n]);
        let mut forward = DeviceArray::zeros(&dev, Shape::from_slice(&[nsamp, 2]))?;
        op.mult_m(&dev, &x_dev, &mut forward, false)?;

        let residual: Vec<C32> = acquired_host
            .as_slice()
            .iter()
            .zip(forward.to_host(&dev)?.as_slice())
            .map(|(y, f)| y - f)
            .collect();
        let residual = upload(&dev, residual, &[nsamp, 2]);

        let mut gradient = DeviceArray::zeros(&dev, Shape::from_slice(&[n, n]))?;
        op.mult_mh(&dev, &residual, &mut gradient, false)?;

        let g = gradient.to_host(&dev)?;
        for (xi, gi) in x.iter_mut().zip(g.as_slice()) {
            *xi += *gi * alpha;
        }

        if step % 10 == 0 {
            let err: f32 = x
                .iter()
                .zip(&truth_data)
                .map(|(a, b)| (a - b).norm_sqr())
                .sum::<f32>()
                .sqrt();
            println!("step {step:2}  ‖x − truth‖ = {err:.4}");
        }
    }

    println!("reconstructed {}×{} image over {} coils", n, n, op.num_coils());
    Ok(())
}
