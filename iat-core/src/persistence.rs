use crate::error::PersistenceError;
use crate::trial::SessionRecord;

/// Durable storage for sealed sessions.
///
/// Implementations must reject a second `save` under an already stored
/// `session_id` with [`PersistenceError::Duplicate`] and leave the stored
/// copy untouched.
pub trait SessionPersistence {
    fn save(&mut self, record: &SessionRecord) -> Result<(), PersistenceError>;

    /// All stored sessions, ordered by session id.
    fn list(&self) -> Result<Vec<SessionRecord>, PersistenceError>;

    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, PersistenceError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|record| record.session_id.as_str() == session_id))
    }
}

impl<P: SessionPersistence + ?Sized> SessionPersistence for Box<P> {
    fn save(&mut self, record: &SessionRecord) -> Result<(), PersistenceError> {
        (**self).save(record)
    }

    fn list(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
        (**self).list()
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, PersistenceError> {
        (**self).get(session_id)
    }
}
