use std::time::Instant;

use ndarray::{arr1, arr2, Array1, Array3};

use ctc_rs::{kernels::warpctc::WarpCtc, CtcLossOp};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Toy problem: 4 time-steps, batch of 2, alphabet of 7 (blank = 0).
    let mut activations = Array3::<f32>::zeros((4, 2, 7));
    for (i, v) in activations.iter_mut().enumerate() {
        *v = ((i * 37 + 11) % 19) as f32 / 19.0;
    }

    let labels = arr2(&[[3, 5, -1, -1], [1, 2, 3, -1]]);
    let input_lengths = arr1(&[4, 4]);

    let op = CtcLossOp::new(WarpCtc);
    let mut costs: Option<Array1<f32>> = None;
    let mut gradients: Option<Array3<f32>> = None;

    let start = Instant::now();
    op.compute(
        activations.view(),
        labels.view(),
        input_lengths.view(),
        &mut costs,
        &mut gradients,
    )?;
    println!("Computed CTC loss in {:.2?}", start.elapsed());

    if let Some(costs) = &costs {
        for (i, cost) in costs.iter().enumerate() {
            println!("sample {}: cost {:.4}", i, cost);
        }
    }
    if let Some(gradients) = &gradients {
        println!("gradient shape: {:?}", gradients.shape());
    }

    Ok(())
}
