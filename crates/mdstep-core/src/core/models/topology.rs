use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TopologyError {
    #[error("Angle type {type_id} is out of range; {num_types} angle types are defined")]
    UnknownAngleType { type_id: u32, num_types: usize },
    #[error("Angle references particle {index}, but the store holds {len}")]
    ParticleOutOfRange { index: usize, len: usize },
    #[error("Angle repeats particle {index}")]
    RepeatedParticle { index: usize },
}

/// Three particles `a-b-c` bent around the vertex `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Angle {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub type_id: u32,
}

/// The angle list of this domain and the table of angle type names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AngleTable {
    type_names: Vec<String>,
    angles: Vec<Angle>,
}

impl AngleTable {
    pub fn new<S: Into<String>>(type_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            type_names: type_names.into_iter().map(Into::into).collect(),
            angles: Vec::new(),
        }
    }

    pub fn add_angle(
        &mut self,
        a: usize,
        b: usize,
        c: usize,
        type_id: u32,
    ) -> Result<(), TopologyError> {
        if type_id as usize >= self.type_names.len() {
            return Err(TopologyError::UnknownAngleType {
                type_id,
                num_types: self.type_names.len(),
            });
        }
        if a == b || a == c {
            return Err(TopologyError::RepeatedParticle { index: a });
        }
        if b == c {
            return Err(TopologyError::RepeatedParticle { index: b });
        }
        self.angles.push(Angle { a, b, c, type_id });
        Ok(())
    }

    pub fn num_types(&self) -> usize {
        self.type_names.len()
    }

    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    pub fn type_id(&self, name: &str) -> Option<u32> {
        self.type_names
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32)
    }

    pub fn angles(&self) -> &[Angle] {
        &self.angles
    }

    pub(crate) fn validate_against(&self, len: usize) -> Result<(), TopologyError> {
        for angle in &self.angles {
            for index in [angle.a, angle.b, angle.c] {
                if index >= len {
                    return Err(TopologyError::ParticleOutOfRange { index, len });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_angle_rejects_unknown_type() {
        let mut table = AngleTable::new(["A-B-A"]);
        assert_eq!(
            table.add_angle(0, 1, 2, 1),
            Err(TopologyError::UnknownAngleType {
                type_id: 1,
                num_types: 1
            })
        );
        assert!(table.add_angle(0, 1, 2, 0).is_ok());
        assert_eq!(table.angles().len(), 1);
    }

    #[test]
    fn add_angle_rejects_repeated_particles() {
        let mut table = AngleTable::new(["t"]);
        assert!(table.add_angle(0, 0, 2, 0).is_err());
        assert!(table.add_angle(0, 2, 2, 0).is_err());
    }

    #[test]
    fn type_id_looks_up_by_name() {
        let table = AngleTable::new(["x", "y"]);
        assert_eq!(table.type_id("y"), Some(1));
        assert_eq!(table.type_id("z"), None);
    }

    #[test]
    fn validate_against_checks_particle_indices() {
        let mut table = AngleTable::new(["t"]);
        table.add_angle(0, 1, 5, 0).unwrap();
        assert_eq!(
            table.validate_against(3),
            Err(TopologyError::ParticleOutOfRange { index: 5, len: 3 })
        );
        assert!(table.validate_against(6).is_ok());
    }
}
