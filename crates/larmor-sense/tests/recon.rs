//! End-to-end encode/decode scenarios on the host backend.

use std::sync::Arc;

use num_complex::Complex32;

use larmor_compute::{CpuDevice, DeviceArray, HostArray, Shape, Shaped};
use larmor_sense::{CartesianSenseOperator, LinearOperator, OperatorError};

type C32 = Complex32;

fn upload(dev: &CpuDevice, data: Vec<C32>, dims: &[usize]) -> DeviceArray<C32, CpuDevice> {
    let host = HostArray::from_vec(data, Shape::from_slice(dims)).unwrap();
    DeviceArray::from_host(dev, &host).unwrap()
}

fn ones_maps(dev: &CpuDevice, dims: &[usize]) -> Arc<DeviceArray<C32, CpuDevice>> {
    let n: usize = dims.iter().product();
    Arc::new(upload(dev, vec![C32::new(1.0, 0.0); n], dims))
}

fn indices(dev: &CpuDevice, idx: Vec<u32>) -> Arc<DeviceArray<u32, CpuDevice>> {
    let host = HostArray::from_vec(idx.clone(), Shape::from_slice(&[idx.len()])).unwrap();
    Arc::new(DeviceArray::from_host(dev, &host).unwrap())
}

/// A 4×4 test image with a distinct complex value per pixel.
fn test_image(dev: &CpuDevice) -> DeviceArray<C32, CpuDevice> {
    let data: Vec<C32> = (0..16).map(|i| C32::new(i as f32 + 1.0, -(i as f32))).collect();
    upload(dev, data, &[4, 4])
}

#[test]
fn full_sampling_forward_adjoint_scales_by_coil_count() {
    let dev = CpuDevice::new();
    let mut op = CartesianSenseOperator::new();
    op.set_sensitivity_maps(ones_maps(&dev, &[4, 4, 2])).unwrap();
    op.set_sampling_indices(&dev, indices(&dev, (0..16).collect())).unwrap();

    let x = test_image(&dev);
    let mut y = DeviceArray::zeros(&dev, Shape::from_slice(&[16, 2])).unwrap();
    let mut back = DeviceArray::zeros(&dev, Shape::from_slice(&[4, 4])).unwrap();
    op.mult_m(&dev, &x, &mut y, false).unwrap();
    op.mult_mh(&dev, &y, &mut back, false).unwrap();

    let xin = x.to_host(&dev).unwrap();
    let out = back.to_host(&dev).unwrap();
    for (o, i) in out.as_slice().iter().copied().zip(xin.as_slice().iter().copied()) {
        assert!((o - i * 2.0).norm() < 1e-5, "got {o}, want {}", i * 2.0);
    }
}

#[test]
fn every_other_column_produces_8_by_2_codomain() {
    let dev = CpuDevice::new();
    let mut op = CartesianSenseOperator::new();
    op.set_sensitivity_maps(ones_maps(&dev, &[4, 4, 2])).unwrap();

    // retain even k-space columns of the 4×4 grid: 8 of 16 positions
    let idx: Vec<u32> = (0..16u32).filter(|p| p % 4 % 2 == 0).collect();
    assert_eq!(idx.len(), 8);
    op.set_sampling_indices(&dev, indices(&dev, idx)).unwrap();
    assert_eq!(op.codomain().unwrap().dims(), &[8, 2]);

    let x = test_image(&dev);
    let mut y = DeviceArray::zeros(&dev, Shape::from_slice(&[8, 2])).unwrap();
    op.mult_m(&dev, &x, &mut y, false).unwrap();
    assert_eq!(y.shape().dims(), &[8, 2]);

    // adjoint of an all-zero codomain input is an all-zero domain output
    let zeros = DeviceArray::zeros(&dev, Shape::from_slice(&[8, 2])).unwrap();
    let mut back = DeviceArray::zeros(&dev, Shape::from_slice(&[4, 4])).unwrap();
    op.mult_mh(&dev, &zeros, &mut back, false).unwrap();
    let out = back.to_host(&dev).unwrap();
    assert!(out.as_slice().iter().all(|v| v.norm() == 0.0));
}

#[test]
fn forward_and_adjoint_satisfy_the_inner_product_identity() {
    let dev = CpuDevice::new();
    let mut op = CartesianSenseOperator::new();

    // non-trivial maps: coil 0 ramps, coil 1 is a constant phase twist
    let mut maps = Vec::with_capacity(32);
    for p in 0..16 {
        maps.push(C32::new(0.25 * p as f32, 0.5));
    }
    for p in 0..16 {
        maps.push(C32::new(0.0, 1.0 - 0.05 * p as f32));
    }
    op.set_sensitivity_maps(Arc::new(upload(&dev, maps, &[4, 4, 2]))).unwrap();
    op.set_sampling_indices(&dev, indices(&dev, vec![1, 4, 6, 7, 10, 13])).unwrap();

    let x = test_image(&dev);
    let y_data: Vec<C32> = (0..12).map(|i| C32::new(0.3 * i as f32, 2.0 - i as f32)).collect();
    let y = upload(&dev, y_data, &[6, 2]);

    let mut ax = DeviceArray::zeros(&dev, Shape::from_slice(&[6, 2])).unwrap();
    let mut ahy = DeviceArray::zeros(&dev, Shape::from_slice(&[4, 4])).unwrap();
    op.mult_m(&dev, &x, &mut ax, false).unwrap();
    op.mult_mh(&dev, &y, &mut ahy, false).unwrap();

    let dot = |a: &DeviceArray<C32, CpuDevice>, b: &DeviceArray<C32, CpuDevice>| -> C32 {
        let a = a.to_host(&dev).unwrap();
        let b = b.to_host(&dev).unwrap();
        a.as_slice()
            .iter()
            .copied()
            .zip(b.as_slice().iter().copied())
            .map(|(u, v)| u * v.conj())
            .sum()
    };

    // ⟨Ax, y⟩ = ⟨x, Aᴴy⟩
    let lhs = dot(&ax, &y);
    let rhs = dot(&x, &ahy);
    assert!((lhs - rhs).norm() < 1e-3, "lhs {lhs}, rhs {rhs}");
}

#[test]
fn accumulate_sums_onto_existing_output() {
    let dev = CpuDevice::new();
    let mut op = CartesianSenseOperator::new();
    op.set_sensitivity_maps(ones_maps(&dev, &[4, 4, 2])).unwrap();
    op.set_sampling_indices(&dev, indices(&dev, (0..16).collect())).unwrap();

    let x = test_image(&dev);
    let prior = C32::new(5.0, 5.0);
    let mut encode_only = DeviceArray::zeros(&dev, Shape::from_slice(&[16, 2])).unwrap();
    let mut accumulated = upload(&dev, vec![prior; 32], &[16, 2]);
    op.mult_m(&dev, &x, &mut encode_only, false).unwrap();
    op.mult_m(&dev, &x, &mut accumulated, true).unwrap();

    let enc = encode_only.to_host(&dev).unwrap();
    let acc = accumulated.to_host(&dev).unwrap();
    for (a, e) in acc.as_slice().iter().copied().zip(enc.as_slice().iter().copied()) {
        assert!((a - (e + prior)).norm() < 1e-5);
    }
}

#[test]
fn shape_contract_rejects_mismatched_arrays() {
    let dev = CpuDevice::new();
    let mut op = CartesianSenseOperator::new();
    op.set_sensitivity_maps(ones_maps(&dev, &[4, 4, 2])).unwrap();
    op.set_sampling_indices(&dev, indices(&dev, (0..16).collect())).unwrap();

    let wrong_in = DeviceArray::<C32, _>::zeros(&dev, Shape::from_slice(&[2, 8])).unwrap();
    let mut y = DeviceArray::zeros(&dev, Shape::from_slice(&[16, 2])).unwrap();
    assert!(matches!(
        op.mult_m(&dev, &wrong_in, &mut y, false),
        Err(OperatorError::ShapeMismatch { .. })
    ));

    let x = test_image(&dev);
    let mut wrong_out = DeviceArray::zeros(&dev, Shape::from_slice(&[2, 16])).unwrap();
    assert!(matches!(
        op.mult_m(&dev, &x, &mut wrong_out, false),
        Err(OperatorError::ShapeMismatch { .. })
    ));
}

#[test]
fn cloned_operator_evaluates_independently() {
    let dev = CpuDevice::new();
    let mut op = CartesianSenseOperator::new();
    op.set_sensitivity_maps(ones_maps(&dev, &[4, 4, 2])).unwrap();
    op.set_sampling_indices(&dev, indices(&dev, (0..16).collect())).unwrap();

    let replica = op.clone_operator();

    // reconfigure the original; the clone keeps the full sampling pattern
    op.set_sampling_indices(&dev, indices(&dev, vec![0, 5, 10, 15])).unwrap();
    assert_eq!(op.codomain().unwrap().dims(), &[4, 2]);
    assert_eq!(replica.codomain().unwrap().dims(), &[16, 2]);

    let x = test_image(&dev);
    let mut y = DeviceArray::zeros(&dev, Shape::from_slice(&[16, 2])).unwrap();
    replica.mult_m(&dev, &x, &mut y, false).unwrap();

    let xin = x.to_host(&dev).unwrap();
    let out = y.to_host(&dev).unwrap();
    // all-ones maps and full sampling: each coil slice replicates the image
    assert_eq!(&out.as_slice()[..16], xin.as_slice());
    assert_eq!(&out.as_slice()[16..], xin.as_slice());
}
