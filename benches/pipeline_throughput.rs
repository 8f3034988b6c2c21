//! Benchmarks for the ingestion path
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use input_ingress::devices::{builtin_registry, xinput, XInputReport, GAMEPAD_FORMAT, XINPUT_FORMAT};
use input_ingress::pipeline::stages::Processor2D;
use input_ingress::pipeline::{PipelineCompiler, PipelineSettings};
use input_ingress::state::StateMemory;
use input_ingress::types::{DeviceId, TICKS_PER_SECOND};
use input_ingress::{IngressConfig, InputEvent, InputRuntime};

fn report(i: usize) -> Vec<u8> {
    XInputReport {
        buttons: if i % 2 == 0 { 0x1000 } else { 0 },
        left_trigger: (i % 256) as u8,
        right_trigger: 0,
        sticks: [(i as i16).wrapping_mul(97), 0, 0, (i as i16).wrapping_mul(-13)],
    }
    .to_bytes()
    .to_vec()
}

/// Full ticks with a growing number of queued reports
fn bench_tick_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_throughput");

    for events in [1usize, 16, 256].iter() {
        group.throughput(Throughput::Elements(*events as u64));
        group.bench_with_input(BenchmarkId::from_parameter(events), events, |b, &events| {
            let mut config = IngressConfig::default();
            config.queue.max_events_per_tick = events;
            let mut runtime = InputRuntime::new(config).unwrap();
            let pad = runtime.add_device(xinput::layout()).unwrap();
            let reports: Vec<_> = (0..events).map(report).collect();
            let mut time = 0u64;

            b.iter(|| {
                for bytes in &reports {
                    time += TICKS_PER_SECOND / 1000;
                    runtime.queue_event(InputEvent::state(pad, time, XINPUT_FORMAT, bytes.clone()));
                }
                black_box(runtime.update().unwrap());
            });
        });
    }

    group.finish();
}

/// Cold compile of the XInput to Gamepad chain
fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_xinput_pipeline", |b| {
        b.iter(|| {
            let mut compiler =
                PipelineCompiler::new(builtin_registry().unwrap(), PipelineSettings::default());
            black_box(compiler.compile(XINPUT_FORMAT, GAMEPAD_FORMAT).unwrap());
        });
    });
}

/// Writing a report into the back arena and diffing it
fn bench_apply_state(c: &mut Criterion) {
    let mut memory = StateMemory::new();
    let block = memory.allocate(DeviceId(1), XINPUT_FORMAT, xinput::REPORT_SIZE);
    let reports: Vec<_> = (0..64).map(report).collect();
    let mut changed = Vec::new();

    c.bench_function("apply_state", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % reports.len();
            memory
                .apply_state(&block, 0, black_box(&reports[i]), &mut changed)
                .unwrap();
            black_box(&changed);
        });
    });
}

/// Radial deadzone over a batch of stick samples
fn bench_stick_deadzone(c: &mut Criterion) {
    let mut group = c.benchmark_group("stick_deadzone");
    let samples: Vec<[f32; 2]> = (0..1000)
        .map(|i| {
            let angle = i as f32 * 0.01;
            let radius = (i % 100) as f32 / 100.0;
            [angle.cos() * radius, angle.sin() * radius]
        })
        .collect();

    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("apply", |b| {
        let settings = PipelineSettings::default();
        let mut layout = input_ingress::pipeline::DatasetLayout::new();
        let src = layout.add_step_function::<2>();
        let dst = layout.add_step_function::<2>();
        let processor = Processor2D::new(src, dst)
            .deadzone(settings.stick_deadzone_min, settings.stick_deadzone_max);
        b.iter(|| {
            let mut sum = 0.0f32;
            for v in &samples {
                let out = processor.apply(black_box(*v));
                sum += out[0] + out[1];
            }
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_tick_throughput,
    bench_compile,
    bench_apply_state,
    bench_stick_deadzone,
);

criterion_main!(benches);
