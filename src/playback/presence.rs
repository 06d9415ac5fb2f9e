use std::time::Duration;

use crate::ids::UserId;

use super::queue::QueueSnapshot;
use super::track::TrackMeta;

/// Instantánea de una sala: lo que suena y lo que espera.
///
/// Modelo de lectura puro derivado del estado del scheduler; construirlo no
/// muta nada ni bloquea detrás del loop.
#[derive(Debug, Clone)]
pub struct RoomReport {
    pub current: Option<TrackMeta>,
    pub queued: Vec<QueueSnapshot>,
}

impl RoomReport {
    /// Obtiene una página específica de la cola
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let safe_page = page.max(1);
        let start = (safe_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.queued.len());
        let total_pages = if self.queued.is_empty() {
            1
        } else {
            self.queued.len().div_ceil(items_per_page)
        };

        QueuePage {
            entries: if start < self.queued.len() {
                self.queued[start..end].to_vec()
            } else {
                Vec::new()
            },
            current_page: safe_page,
            total_pages,
            total_items: self.queued.len(),
        }
    }

    /// Las entradas encoladas por un usuario, en orden de inserción
    pub fn queued_by(&self, user_id: UserId) -> Vec<QueueSnapshot> {
        self.queued
            .iter()
            .filter(|entry| entry.requested_by == user_id)
            .cloned()
            .collect()
    }

    /// Duración total pendiente: cola más track actual
    pub fn total_duration(&self) -> Duration {
        let queued: Duration = self.queued.iter().map(|entry| entry.meta.duration).sum();
        let current = self
            .current
            .as_ref()
            .map(|meta| meta.duration)
            .unwrap_or_default();
        queued + current
    }
}

/// Página de la cola para listados largos
#[derive(Debug, Clone)]
pub struct QueuePage {
    pub entries: Vec<QueueSnapshot>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Etiqueta legible de un track: título y duración
pub fn describe(meta: &TrackMeta) -> String {
    format!(
        "{} ({})",
        meta.title,
        humantime::format_duration(Duration::from_secs(meta.duration.as_secs()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn snapshot(title: &str, user: u64) -> QueueSnapshot {
        QueueSnapshot {
            meta: TrackMeta {
                id: format!("test:{title}"),
                title: title.to_string(),
                duration: Duration::from_secs(100),
                requested_by: UserId(user),
            },
            requested_by: UserId(user),
            enqueued_at: Utc::now(),
        }
    }

    fn report(count: usize) -> RoomReport {
        RoomReport {
            current: None,
            queued: (0..count).map(|i| snapshot(&format!("t{i}"), i as u64)).collect(),
        }
    }

    #[test]
    fn pages_split_the_queue() {
        let report = report(25);

        let first = report.page(1, 10);
        assert_eq!(first.entries.len(), 10);
        assert_eq!(first.entries[0].meta.title, "t0");
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_items, 25);

        let last = report.page(3, 10);
        assert_eq!(last.entries.len(), 5);
        assert_eq!(last.entries[0].meta.title, "t20");
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let report = report(3);
        let page = report.page(9, 10);
        assert!(page.entries.is_empty());
        assert_eq!(page.total_pages, 1);

        // página 0 se trata como la primera
        assert_eq!(report.page(0, 10).entries.len(), 3);
    }

    #[test]
    fn empty_queue_still_has_one_page() {
        let page = report(0).page(1, 10);
        assert_eq!(page.total_pages, 1);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn filters_queue_by_user() {
        let mut report = report(0);
        report.queued = vec![snapshot("a", 1), snapshot("b", 2), snapshot("c", 1)];

        let mine: Vec<_> = report
            .queued_by(UserId(1))
            .into_iter()
            .map(|s| s.meta.title)
            .collect();
        assert_eq!(mine, vec!["a", "c"]);
        assert!(report.queued_by(UserId(9)).is_empty());
    }

    #[test]
    fn total_duration_includes_current() {
        let mut report = report(2); // 200s encolados
        report.current = Some(TrackMeta {
            id: "test:actual".into(),
            title: "actual".into(),
            duration: Duration::from_secs(50),
            requested_by: UserId(1),
        });
        assert_eq!(report.total_duration(), Duration::from_secs(250));
    }

    #[test]
    fn describe_is_human_readable() {
        let meta = TrackMeta {
            id: "test:x".into(),
            title: "Canción".into(),
            duration: Duration::from_secs(200),
            requested_by: UserId(1),
        };
        assert_eq!(describe(&meta), "Canción (3m 20s)");
    }
}
