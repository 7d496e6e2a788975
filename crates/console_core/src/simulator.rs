use rand::Rng;
use shared::domain::{BoundingBox, Centre, GeoPoint, Student, StudentCategory, StudentId};

use crate::{
    error::ValidationError,
    geo::{self, METERS_PER_DEGREE_LAT},
};

pub const RADIUS_MARGIN: f64 = 1.25;
pub const MIN_RADIUS_M: f64 = 2_000.0;
/// Total draws allowed per requested student, accepted and rejected together.
pub const DRAW_BUDGET_FACTOR: usize = 100;

/// Upper bounds of the category draw: `[0, 0.05)` pwd, `[0.05, 0.20)` female.
pub const PWD_CUTOFF: f64 = 0.05;
pub const FEMALE_CUTOFF: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationArea {
    pub centroid: GeoPoint,
    pub radius_m: f64,
    pub bounds: BoundingBox,
}

impl SimulationArea {
    pub fn around(centres: &[Centre]) -> Result<Self, ValidationError> {
        let points: Vec<GeoPoint> = centres.iter().map(Centre::point).collect();
        let centroid = geo::centroid(&points).ok_or(ValidationError::NoCentres)?;
        let radius_m = (geo::bounding_radius(centroid, &points) * RADIUS_MARGIN).max(MIN_RADIUS_M);

        let lat_offset = radius_m / METERS_PER_DEGREE_LAT;
        let lon_offset = radius_m / (METERS_PER_DEGREE_LAT * centroid.lat.to_radians().cos());
        let bounds = BoundingBox {
            min_lat: centroid.lat - lat_offset,
            min_lon: centroid.lon - lon_offset,
            max_lat: centroid.lat + lat_offset,
            max_lon: centroid.lon + lon_offset,
        };

        Ok(Self {
            centroid,
            radius_m,
            bounds,
        })
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        geo::distance(self.centroid, point) <= self.radius_m
    }
}

#[derive(Debug, Clone)]
pub struct Simulation {
    pub area: SimulationArea,
    pub requested: usize,
    pub draws: usize,
    pub students: Vec<Student>,
}

impl Simulation {
    pub fn is_short(&self) -> bool {
        self.students.len() < self.requested
    }
}

pub fn category_for(r: f64) -> StudentCategory {
    if r < PWD_CUTOFF {
        StudentCategory::Pwd
    } else if r < FEMALE_CUTOFF {
        StudentCategory::Female
    } else {
        StudentCategory::General
    }
}

/// Rejection-samples up to `count` students in a disc around the centres'
/// centroid. Returns fewer once `count * DRAW_BUDGET_FACTOR` draws are spent.
pub fn generate<R: Rng + ?Sized>(
    count: usize,
    centres: &[Centre],
    rng: &mut R,
) -> Result<Simulation, ValidationError> {
    if count == 0 {
        return Err(ValidationError::InvalidStudentCount(0));
    }
    let area = SimulationArea::around(centres)?;
    let bounds = area.bounds;
    let budget = count.saturating_mul(DRAW_BUDGET_FACTOR);

    let mut students = Vec::with_capacity(count);
    let mut draws = 0;
    while students.len() < count && draws < budget {
        draws += 1;
        let lat = bounds.min_lat + rng.gen::<f64>() * (bounds.max_lat - bounds.min_lat);
        let lon = bounds.min_lon + rng.gen::<f64>() * (bounds.max_lon - bounds.min_lon);
        let point = GeoPoint::new(lat, lon);
        if !area.contains(point) {
            continue;
        }

        let category = category_for(rng.gen::<f64>());
        students.push(Student {
            student_id: StudentId::sequential(students.len() + 1),
            lat,
            lon,
            category,
        });
    }

    Ok(Simulation {
        area,
        requested: count,
        draws,
        students,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, SeedableRng};
    use shared::domain::CentreId;

    use super::*;

    fn centre(n: usize, lat: f64, lon: f64) -> Centre {
        Centre {
            centre_id: CentreId::sequential(n),
            lat,
            lon,
            max_capacity: 50,
        }
    }

    fn jodhpur_pair() -> Vec<Centre> {
        vec![centre(1, 26.2739, 73.0359), centre(2, 26.2950, 73.0600)]
    }

    #[test]
    fn single_centre_uses_floor_radius() {
        let area = SimulationArea::around(&[centre(1, 26.27, 73.03)]).expect("area");
        assert_eq!(area.radius_m, MIN_RADIUS_M);
        assert_eq!(area.centroid, GeoPoint::new(26.27, 73.03));
    }

    #[test]
    fn clustered_centres_never_go_below_floor() {
        let centres = vec![centre(1, 26.2700, 73.0300), centre(2, 26.2701, 73.0301)];
        let area = SimulationArea::around(&centres).expect("area");
        assert_eq!(area.radius_m, MIN_RADIUS_M);
    }

    #[test]
    fn spread_centres_widen_radius_by_margin() {
        let centres = vec![centre(1, 26.0, 73.0), centre(2, 26.2, 73.0)];
        let area = SimulationArea::around(&centres).expect("area");
        let half_span = geo::distance(area.centroid, centres[0].point());
        assert!((area.radius_m - half_span * RADIUS_MARGIN).abs() < 1.0);
        assert!(area.radius_m > MIN_RADIUS_M);
    }

    #[test]
    fn bounds_enclose_the_disc() {
        let area = SimulationArea::around(&jodhpur_pair()).expect("area");
        let lat_extent = (area.bounds.max_lat - area.bounds.min_lat) / 2.0 * METERS_PER_DEGREE_LAT;
        assert!((lat_extent - area.radius_m).abs() < 1e-3);
        let lon_span = area.bounds.max_lon - area.bounds.min_lon;
        assert!(lon_span > area.bounds.max_lat - area.bounds.min_lat);
    }

    #[test]
    fn rejects_empty_centre_set_and_zero_count() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            generate(10, &[], &mut rng).expect_err("no centres"),
            ValidationError::NoCentres
        );
        assert_eq!(
            generate(0, &jodhpur_pair(), &mut rng).expect_err("zero"),
            ValidationError::InvalidStudentCount(0)
        );
    }

    #[test]
    fn students_stay_inside_the_disc_with_unique_sequential_ids() {
        let mut rng = StdRng::seed_from_u64(7);
        let simulation = generate(1_000, &jodhpur_pair(), &mut rng).expect("simulate");

        assert!(simulation.students.len() <= 1_000);
        assert!(simulation.draws <= 1_000 * DRAW_BUDGET_FACTOR);
        for student in &simulation.students {
            assert!(simulation.area.contains(student.point()));
        }
        let ids: HashSet<_> = simulation.students.iter().map(|s| &s.student_id).collect();
        assert_eq!(ids.len(), simulation.students.len());
        assert_eq!(simulation.students[0].student_id.as_str(), "student_1");
    }

    #[test]
    fn same_stream_gives_same_population() {
        let a = generate(200, &jodhpur_pair(), &mut StdRng::seed_from_u64(42)).expect("a");
        let b = generate(200, &jodhpur_pair(), &mut StdRng::seed_from_u64(42)).expect("b");
        assert_eq!(a.students, b.students);
        assert_eq!(a.draws, b.draws);
    }

    #[test]
    fn category_thresholds() {
        assert_eq!(category_for(0.0), StudentCategory::Pwd);
        assert_eq!(category_for(0.0499), StudentCategory::Pwd);
        assert_eq!(category_for(0.05), StudentCategory::Female);
        assert_eq!(category_for(0.1999), StudentCategory::Female);
        assert_eq!(category_for(0.20), StudentCategory::General);
        assert_eq!(category_for(0.999), StudentCategory::General);
    }

    #[test]
    fn category_split_converges_over_large_sample() {
        let mut rng = StdRng::seed_from_u64(2024);
        let simulation = generate(100_000, &jodhpur_pair(), &mut rng).expect("simulate");
        let total = simulation.students.len() as f64;
        let share = |category| {
            simulation
                .students
                .iter()
                .filter(|s| s.category == category)
                .count() as f64
                / total
        };
        assert!((share(StudentCategory::Pwd) - 0.05).abs() < 0.01);
        assert!((share(StudentCategory::Female) - 0.15).abs() < 0.01);
        assert!((share(StudentCategory::General) - 0.80).abs() < 0.01);
    }

    /// Always lands in a bounding-box corner, outside the disc.
    struct CornerRng;

    impl rand::RngCore for CornerRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    #[test]
    fn exhausted_draw_budget_returns_short_population() {
        let simulation = generate(5, &jodhpur_pair(), &mut CornerRng).expect("simulate");
        assert!(simulation.students.is_empty());
        assert!(simulation.is_short());
        assert_eq!(simulation.draws, 5 * DRAW_BUDGET_FACTOR);
    }
}
