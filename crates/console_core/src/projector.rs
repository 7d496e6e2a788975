use shared::domain::{CentreId, GeoPoint, Student, StudentCategory, StudentId};

use crate::session::SessionState;

/// Centre colors by insertion order. Centres past the eighth reuse colors.
pub const CENTRE_PALETTE: [&str; 8] = [
    "#ef4444", "#f59e0b", "#10b981", "#3b82f6", "#8b5cf6", "#ec4899", "#14b8a6", "#f97316",
];

pub const UNASSIGNED_COLOR: &str = "#6b7280";

/// The backend reports missing paths as a huge finite distance.
pub const UNREACHABLE_THRESHOLD_SECONDS: f64 = 9_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TravelTime {
    Unknown,
    Unreachable,
    Seconds(f64),
}

impl TravelTime {
    pub fn classify(seconds: Option<f64>) -> Self {
        match seconds {
            None => Self::Unknown,
            Some(s) if s.is_nan() => Self::Unknown,
            Some(s) if s == f64::INFINITY => Self::Unreachable,
            Some(s) if s > UNREACHABLE_THRESHOLD_SECONDS => Self::Unreachable,
            Some(s) => Self::Seconds(s),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Unknown => "N/A".to_string(),
            Self::Unreachable => "Unreachable".to_string(),
            Self::Seconds(s) => {
                let minutes = (s / 60.0).floor() as i64;
                let seconds = (s % 60.0).floor() as i64;
                format!("{minutes}m {seconds}s")
            }
        }
    }
}

pub fn travel_time_label(seconds: Option<f64>) -> String {
    TravelTime::classify(seconds).label()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub centre_id: CentreId,
    pub color: &'static str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub centres: usize,
    pub students: usize,
    pub assigned: usize,
    pub pwd: usize,
    pub female: usize,
    pub general: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeRow {
    pub centre_id: CentreId,
    pub color: &'static str,
    pub label: String,
    pub unreachable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentDetail {
    pub student_id: StudentId,
    pub category: StudentCategory,
    pub assigned_centre: Option<CentreId>,
    pub marker_color: &'static str,
    pub travel_times: Vec<TravelTimeRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker<Id> {
    pub id: Id,
    pub point: GeoPoint,
    pub color: &'static str,
}

pub struct ResultProjector<'a> {
    session: &'a SessionState,
}

impl<'a> ResultProjector<'a> {
    pub fn new(session: &'a SessionState) -> Self {
        Self { session }
    }

    pub fn color_for(&self, centre_id: &CentreId) -> Option<&'static str> {
        self.session
            .centre_index(centre_id)
            .map(|index| CENTRE_PALETTE[index % CENTRE_PALETTE.len()])
    }

    pub fn marker_color_for(&self, student: &Student) -> &'static str {
        self.session
            .assigned_centre(&student.student_id)
            .and_then(|centre_id| self.color_for(centre_id))
            .unwrap_or(UNASSIGNED_COLOR)
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.session
            .centres()
            .iter()
            .enumerate()
            .map(|(index, centre)| LegendEntry {
                centre_id: centre.centre_id.clone(),
                color: CENTRE_PALETTE[index % CENTRE_PALETTE.len()],
            })
            .collect()
    }

    pub fn centre_markers(&self) -> Vec<Marker<CentreId>> {
        self.legend()
            .into_iter()
            .zip(self.session.centres())
            .map(|(entry, centre)| Marker {
                id: entry.centre_id,
                point: centre.point(),
                color: entry.color,
            })
            .collect()
    }

    pub fn student_markers(&self) -> Vec<Marker<StudentId>> {
        self.session
            .students()
            .iter()
            .map(|student| Marker {
                id: student.student_id.clone(),
                point: student.point(),
                color: self.marker_color_for(student),
            })
            .collect()
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            centres: self.session.centres().len(),
            students: self.session.students().len(),
            assigned: self.session.assignments().len(),
            ..SessionStats::default()
        };
        for student in self.session.students() {
            match student.category {
                StudentCategory::Pwd => stats.pwd += 1,
                StudentCategory::Female => stats.female += 1,
                StudentCategory::General => stats.general += 1,
            }
        }
        stats
    }

    /// Assignment status and one travel-time row per centre, in centre order.
    pub fn student_detail(&self, student_id: &StudentId) -> Option<StudentDetail> {
        let student = self.session.student(student_id)?;
        let distances = self.session.distances().get(student_id);
        let travel_times = self
            .legend()
            .into_iter()
            .map(|entry| {
                let seconds = distances
                    .and_then(|row| row.get(&entry.centre_id).copied().flatten());
                let travel_time = TravelTime::classify(seconds);
                TravelTimeRow {
                    label: travel_time.label(),
                    unreachable: travel_time == TravelTime::Unreachable,
                    centre_id: entry.centre_id,
                    color: entry.color,
                }
            })
            .collect();

        Some(StudentDetail {
            student_id: student.student_id.clone(),
            category: student.category,
            assigned_centre: self.session.assigned_centre(student_id).cloned(),
            marker_color: self.marker_color_for(student),
            travel_times,
        })
    }
}
