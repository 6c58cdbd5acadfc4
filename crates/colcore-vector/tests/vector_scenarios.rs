use colcore_storage::{DeviceRuntime, SimulatedDevice, tracker};
use colcore_vector::*;
use std::sync::Arc;

#[test]
fn int64_capacity_three_overrun() {
    let mut b = ColumnBuilder::new(DType::Int64, 3);
    b.append(2i64).unwrap();
    b.append_null().unwrap();
    b.append(5i64).unwrap();
    assert_eq!(b.remaining(), 0);
    assert_eq!(
        b.append(4i64).unwrap_err(),
        ColumnError::CapacityExceeded {
            requested: 4,
            capacity: 3
        }
    );
    // A null is still a row and is subject to the same limit.
    assert!(matches!(
        b.append_null().unwrap_err(),
        ColumnError::CapacityExceeded { .. }
    ));

    let v = b.build_on_host().unwrap();
    assert_eq!(v.row_count(), 3);
    assert_eq!(
        v.scan_range::<i64>(0, 3).unwrap(),
        vec![Some(2), None, Some(5)]
    );
    v.close();
}

#[test]
fn overrun_inside_build_closure() {
    let err = ColumnVector::build(DType::Int32, 3, |b| {
        b.append(2i32)?.append_null()?;
        b.append_repeated(5i32, 4)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, ColumnError::CapacityExceeded { .. }));

    let err = ColumnVector::build(DType::Float64, 1, |b| {
        b.append_slice(&[5.003f64, 4.0])?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, ColumnError::CapacityExceeded { .. }));
}

#[test]
fn concatenate_four_three_two() {
    let v0 = ColumnVector::from_slice(&[1i32, 2, 3, 4]).unwrap();
    let v1 = ColumnVector::from_slice(&[5i32, 6, 7]).unwrap();
    let v2 = ColumnVector::from_slice(&[8i32, 9]).unwrap();
    let v = ColumnVector::concatenate(&[&v0, &v1, &v2]).unwrap();
    assert_eq!(v.row_count(), 9);
    assert!(!v.has_validity_vector());
    assert!(!v.has_nulls());
    let values: Vec<i32> = (0..9).map(|i| v.get::<i32>(i).unwrap()).collect();
    assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    for x in [v0, v1, v2, v] {
        x.close();
    }
}

#[test]
fn concatenate_type_mismatch_leaves_inputs_intact() {
    let a = ColumnVector::from_options(&[Some(1i64), None]).unwrap();
    let b = ColumnVector::from_slice(&[1.0f64]).unwrap();
    assert!(matches!(
        ColumnVector::concatenate(&[&a, &b]).unwrap_err(),
        ColumnError::TypeMismatch { .. }
    ));
    assert_eq!(a.row_count(), 2);
    assert_eq!(a.null_count(), 1);
    assert_eq!(b.get::<f64>(0).unwrap(), 1.0);
    a.close();
    b.close();
}

#[test]
fn cast_narrows_by_truncation() {
    let v = ColumnVector::from_options(&[Some(4.3f64), None, Some(3.8)]).unwrap();
    for target in [DType::Int8, DType::Int16, DType::Int32, DType::Int64] {
        let out = v.cast_to(target).unwrap();
        assert_eq!(out.dtype(), target);
        assert_eq!(out.get_scalar(0).unwrap().as_i64(), Some(4));
        assert_eq!(out.get_scalar(1).unwrap(), Scalar::Null);
        assert_eq!(out.get_scalar(2).unwrap().as_i64(), Some(3));
        out.close();
    }
    v.close();
}

#[test]
fn date_cast_to_int8() {
    let dates = ColumnVector::dates_from_options(&[Some(17897), None]).unwrap();
    let out = dates.cast_to(DType::Int8).unwrap();
    assert_eq!(out.get::<i8>(0).unwrap(), -23);
    assert!(out.is_null(1).unwrap());
    dates.close();
    out.close();
}

#[test]
fn every_pair_in_the_matrix_preserves_nulls() {
    let fixed: Vec<DType> = DType::ALL
        .into_iter()
        .filter(|t| t.is_fixed_width())
        .collect();
    let base = ColumnVector::from_options(&[Some(1i8), None, Some(0), None]).unwrap();
    for &from in &fixed {
        let source = base.cast_to(from).unwrap();
        for &to in &fixed {
            let out = source.cast_to(to).unwrap();
            for i in 0..4 {
                assert_eq!(out.is_null(i).unwrap(), source.is_null(i).unwrap());
            }
            assert_eq!(out.null_count(), 2);
            out.close();
        }
        source.close();
    }
    base.close();
}

/// Small deterministic generator for null patterns.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn append_vector_split_sweep() {
    let mut rng = Lcg(0x5eed);
    for size in 1..=31usize {
        let values: Vec<Option<i32>> = (0..size)
            .map(|i| (rng.next() % 3 != 0).then_some(i as i32 * 7 - 50))
            .collect();
        let nulls = values.iter().filter(|v| v.is_none()).count();

        for split in 0..=size {
            let head = ColumnVector::from_options(&values[..split]).unwrap();
            let tail = ColumnVector::from_options(&values[split..]).unwrap();
            let capacity = size + (rng.next() % 70) as usize;
            let mut b = if split % 2 == 0 {
                ColumnBuilder::with_validity(DType::Int32, capacity)
            } else {
                ColumnBuilder::new(DType::Int32, capacity)
            };
            b.append_vector(&head).unwrap().append_vector(&tail).unwrap();
            let joined = b.build_on_host().unwrap();

            let ctx = format!("size {size} split {split} capacity {capacity}");
            assert_eq!(joined.row_count(), size, "{ctx}");
            assert_eq!(joined.null_count(), nulls, "{ctx}");
            assert_eq!(joined.scan_range::<i32>(0, size).unwrap(), values, "{ctx}");
            if let Some(bits) = joined.validity_capacity_bits().unwrap() {
                assert!(bits >= capacity, "{ctx}");
                for i in size..bits {
                    assert!(!joined.is_null_extended_range(i).unwrap(), "{ctx} padding bit {i}");
                }
            } else {
                assert_eq!(nulls, 0, "{ctx}");
            }
            for x in [head, tail, joined] {
                x.close();
            }
        }
    }
}

#[test]
fn device_roundtrip_through_custom_runtime() {
    let dev = Arc::new(SimulatedDevice::new());
    let runtime: Arc<dyn DeviceRuntime> = dev.clone();
    let mut b = ColumnBuilder::new(DType::String, 3);
    b.append_option_strs(&[Some("alpha"), None, Some("gamma")])
        .unwrap();
    let v = b.build_with_runtime(&runtime).unwrap();
    assert_eq!(v.residency(), Residency::Device);
    assert_eq!(dev.upload_count(), 3);

    let view = v.ensure_on_host().unwrap();
    assert_eq!(view.rows(), 3);
    assert_eq!(view.offsets(), Some(&[0u32, 5, 5, 10][..]));
    assert_eq!(view.data(), b"alphagamma");
    assert_eq!(v.get_str(2).unwrap(), "gamma");
    assert_eq!(v.residency(), Residency::Both);

    let shared = v.clone();
    v.close();
    assert!(dev.bytes_in_use() > 0);
    shared.close();
    assert_eq!(dev.bytes_in_use(), 0);
}

#[test]
fn explicit_close_is_not_a_leak() {
    let released_before = tracker().released_count();
    let v = ColumnVector::from_slice(&[1i8, 2, 3]).unwrap();
    let w = v.clone();
    assert_eq!(w.ref_count(), 2);
    v.close();
    w.close();
    assert!(tracker().released_count() > released_before);
}

#[test]
fn arithmetic_on_mixed_columns() {
    let prices = ColumnVector::from_options(&[Some(10.5f64), Some(2.25), None]).unwrap();
    let qty = ColumnVector::from_slice(&[2i32, 4, 1]).unwrap();
    let total = binary_op(&prices, &qty, BinaryOp::Mul, DType::Float64).unwrap();
    assert_eq!(
        total.scan_range::<f64>(0, 3).unwrap(),
        vec![Some(21.0), Some(9.0), None]
    );
    let halves = binary_op_scalar(&qty, &Scalar::Int32(2), BinaryOp::FloorDiv, DType::Int32).unwrap();
    assert_eq!(
        halves.scan_range::<i32>(0, 3).unwrap(),
        vec![Some(1), Some(2), Some(0)]
    );
    for x in [prices, qty, total, halves] {
        x.close();
    }
}
