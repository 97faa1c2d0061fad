use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;

use ephemgen::constants::{GMS_DE440, J2000_JD};
use ephemgen::ephemeris::chebyshev_source::ChebyshevEphemeris;
use ephemgen::ephemeris::{EphemerisObject, EphemerisSource, SSB};
use ephemgen::integration::motion::{ForceModel, ForceToggles};
use ephemgen::perturber::{BodyKind, PerturberBody, PerturberSet};

const START: f64 = J2000_JD - 50.0;
const END: f64 = J2000_JD + 50.0;

fn source() -> Arc<dyn EphemerisSource> {
    let fit = |id: &str, a: f64| {
        let info = EphemerisObject {
            id: id.into(),
            name: id.into(),
            origin_id: SSB.into(),
            diameter: None,
        };
        let n = if a > 0.0 { (GMS_DE440 / (a * a * a)).sqrt() } else { 0.0 };
        ChebyshevEphemeris::fit_object(&info, START, END, 8.0, 20, move |jd| {
            let u = n * (jd - J2000_JD);
            Vector3::new(a * u.cos(), a * u.sin(), 0.0)
        })
        .unwrap()
    };
    let records = vec![fit("Sn", 0.0), fit("Ju", 5.203), fit("Sa", 9.537)];
    let constants = [
        ("GMS".to_string(), GMS_DE440),
        ("GM5".to_string(), 2.825_345_842_083_778e-7),
        ("GM6".to_string(), 8.459_706_073_245_031e-8),
        ("J2SUN".to_string(), 2.196_139_151_652_443e-7),
    ];
    Arc::new(ChebyshevEphemeris::new("bench", records, constants).unwrap())
}

fn bench_acceleration(c: &mut Criterion) {
    let source = source();
    let perturbers = PerturberSet::from_bodies(
        [BodyKind::Sun, BodyKind::Jupiter, BodyKind::Saturn]
            .into_iter()
            .map(|kind| PerturberBody::planet(kind, source.clone()).unwrap())
            .collect(),
    );
    let r = Vector3::new(1.1, -2.0, 0.3);
    let v = Vector3::new(0.009, 0.004, -0.001);

    let mut group = c.benchmark_group("motion");
    for (label, toggles) in [
        ("newtonian", ForceToggles {
            relativistic: false,
            figure_effects: false,
            non_gravitational: false,
        }),
        ("full", ForceToggles::default()),
    ] {
        let mut model = ForceModel::<f64>::new(&perturbers, toggles, None, J2000_JD, 1.0);
        group.bench_function(format!("acceleration/{label}"), |b| {
            b.iter(|| black_box(model.acceleration(black_box(J2000_JD + 3.5), &r, &v).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_acceleration);
criterion_main!(benches);
