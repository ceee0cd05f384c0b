//! The collections the records backend exposes.
//!
//! Each resource has a cache key (also used as the binder key), a REST
//! collection path, and the interval at which screens showing it poll.
//! Fast-moving queues poll every few seconds; reference data every couple
//! of minutes.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Alunos,
    Cursos,
    Salas,
    Turmas,
    ListaEspera,
    Vagas,
    Inscricoes,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Alunos,
        Resource::Cursos,
        Resource::Salas,
        Resource::Turmas,
        Resource::ListaEspera,
        Resource::Vagas,
        Resource::Inscricoes,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Resource::Alunos => "alunos",
            Resource::Cursos => "cursos",
            Resource::Salas => "salas",
            Resource::Turmas => "turmas",
            Resource::ListaEspera => "lista_espera",
            Resource::Vagas => "vagas",
            Resource::Inscricoes => "inscricoes",
        }
    }

    /// Collection path relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Alunos => "alunos/",
            Resource::Cursos => "cursos/",
            Resource::Salas => "salas/",
            Resource::Turmas => "turmas/",
            Resource::ListaEspera => "lista-espera/",
            Resource::Vagas => "vagas/",
            Resource::Inscricoes => "inscricoes/",
        }
    }

    /// Path of a single item in the collection.
    pub fn item_path(&self, id: &str) -> String {
        format!("{}{}/", self.path(), id)
    }

    pub fn poll_interval(&self) -> Duration {
        let secs = match self {
            Resource::ListaEspera => 2,
            Resource::Vagas => 5,
            Resource::Inscricoes => 10,
            Resource::Alunos | Resource::Turmas => 30,
            Resource::Cursos | Resource::Salas => 120,
        };
        Duration::from_secs(secs)
    }

    /// Parse a cache key. Hyphenated path spellings are accepted too.
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized = key.trim().trim_end_matches('/').replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|resource| resource.key() == normalized)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key_roundtrip() {
        for resource in Resource::ALL {
            assert_eq!(Resource::from_key(resource.key()), Some(resource));
        }
    }

    #[test]
    fn test_from_key_accepts_path_spelling() {
        assert_eq!(Resource::from_key("lista-espera/"), Some(Resource::ListaEspera));
        assert_eq!(Resource::from_key("professores"), None);
    }

    #[test]
    fn test_poll_intervals_in_range() {
        for resource in Resource::ALL {
            let secs = resource.poll_interval().as_secs();
            assert!((2..=120).contains(&secs), "{} polls every {}s", resource, secs);
        }
    }

    #[test]
    fn test_item_path() {
        assert_eq!(Resource::Turmas.item_path("12"), "turmas/12/");
    }
}
