use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{FunnelError, FunnelResult};
use crate::models::{Lead, Property, User, Viewing};

/// Snapshot of a stored record plus the version that produced it.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

/// Persistence collaborator for the funnel core.
///
/// Writes are optimistic: the caller passes back the version it read and the
/// store rejects the write with a conflict when another writer got there
/// first. Two operations racing on the same lead therefore cannot both apply
/// a read-modify-write from stale snapshots.
pub trait FunnelStore: Send + Sync {
    fn insert_lead(&self, lead: Lead) -> FunnelResult<()>;
    fn lead(&self, id: Uuid) -> FunnelResult<Versioned<Lead>>;
    fn update_lead(&self, expected_version: u64, lead: Lead) -> FunnelResult<u64>;
    fn leads_by_owner(&self, owner: Uuid) -> FunnelResult<Vec<Lead>>;
    fn leads_due_for_follow_up(&self, now: DateTime<Utc>) -> FunnelResult<Vec<Versioned<Lead>>>;

    fn insert_viewing(&self, viewing: Viewing) -> FunnelResult<()>;
    fn viewing(&self, id: Uuid) -> FunnelResult<Versioned<Viewing>>;
    fn update_viewing(&self, expected_version: u64, viewing: Viewing) -> FunnelResult<u64>;
    fn viewings_for_property(&self, property_id: Uuid) -> FunnelResult<Vec<Viewing>>;
    fn viewings_for_lead(&self, lead_id: Uuid) -> FunnelResult<Vec<Viewing>>;
    fn viewings_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FunnelResult<Vec<Versioned<Viewing>>>;

    fn insert_property(&self, property: Property) -> FunnelResult<()>;
    fn property(&self, id: Uuid) -> FunnelResult<Property>;

    fn insert_user(&self, user: User) -> FunnelResult<()>;
    fn user(&self, id: Uuid) -> FunnelResult<User>;
}

/// Re-reads and reapplies `apply` until the versioned write lands, giving the
/// caller a serialized per-id critical section for secondary mutations
/// (audit appends, flag flips) that are valid against any current state.
///
/// Decision-bearing writes (offer evaluation, deal closure) must NOT go
/// through this: their outcome depends on the snapshot they read, so a
/// conflict there is surfaced to the caller as retryable instead.
pub fn update_lead_with<F>(store: &dyn FunnelStore, id: Uuid, mut apply: F) -> FunnelResult<Lead>
where
    F: FnMut(&mut Lead),
{
    const MAX_ATTEMPTS: usize = 5;
    for _ in 0..MAX_ATTEMPTS {
        let Versioned { mut record, version } = store.lead(id)?;
        apply(&mut record);
        match store.update_lead(version, record.clone()) {
            Ok(_) => return Ok(record),
            Err(FunnelError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(FunnelError::Conflict(id))
}

/// In-process store used for wiring and tests. Production deployments swap
/// in a database-backed implementation of [`FunnelStore`].
#[derive(Default)]
pub struct MemoryStore {
    leads: RwLock<HashMap<Uuid, Versioned<Lead>>>,
    viewings: RwLock<HashMap<Uuid, Versioned<Viewing>>>,
    properties: RwLock<HashMap<Uuid, Property>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<'a, T>(
        table: &'a RwLock<HashMap<Uuid, T>>,
        name: &'static str,
    ) -> FunnelResult<RwLockReadGuard<'a, HashMap<Uuid, T>>> {
        table
            .read()
            .map_err(|_| FunnelError::Storage(format!("{name} table lock poisoned")))
    }

    fn write<'a, T>(
        table: &'a RwLock<HashMap<Uuid, T>>,
        name: &'static str,
    ) -> FunnelResult<RwLockWriteGuard<'a, HashMap<Uuid, T>>> {
        table
            .write()
            .map_err(|_| FunnelError::Storage(format!("{name} table lock poisoned")))
    }
}

impl FunnelStore for MemoryStore {
    fn insert_lead(&self, lead: Lead) -> FunnelResult<()> {
        let mut leads = Self::write(&self.leads, "lead")?;
        leads.insert(lead.id, Versioned { record: lead, version: 1 });
        Ok(())
    }

    fn lead(&self, id: Uuid) -> FunnelResult<Versioned<Lead>> {
        let leads = Self::read(&self.leads, "lead")?;
        leads.get(&id).cloned().ok_or(FunnelError::NotFound("lead"))
    }

    fn update_lead(&self, expected_version: u64, lead: Lead) -> FunnelResult<u64> {
        let mut leads = Self::write(&self.leads, "lead")?;
        let entry = leads
            .get_mut(&lead.id)
            .ok_or(FunnelError::NotFound("lead"))?;
        if entry.version != expected_version {
            return Err(FunnelError::Conflict(lead.id));
        }
        entry.version += 1;
        entry.record = lead;
        Ok(entry.version)
    }

    fn leads_by_owner(&self, owner: Uuid) -> FunnelResult<Vec<Lead>> {
        let leads = Self::read(&self.leads, "lead")?;
        Ok(leads
            .values()
            .filter(|v| v.record.created_by == owner)
            .map(|v| v.record.clone())
            .collect())
    }

    fn leads_due_for_follow_up(&self, now: DateTime<Utc>) -> FunnelResult<Vec<Versioned<Lead>>> {
        let leads = Self::read(&self.leads, "lead")?;
        let mut due: Vec<Versioned<Lead>> = leads
            .values()
            .filter(|v| {
                v.record.auto_follow_up_enabled
                    && !v.record.funnel_stage.is_terminal()
                    && v.record.next_follow_up_date.is_some_and(|d| d <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|v| v.record.next_follow_up_date);
        Ok(due)
    }

    fn insert_viewing(&self, viewing: Viewing) -> FunnelResult<()> {
        let mut viewings = Self::write(&self.viewings, "viewing")?;
        viewings.insert(
            viewing.id,
            Versioned { record: viewing, version: 1 },
        );
        Ok(())
    }

    fn viewing(&self, id: Uuid) -> FunnelResult<Versioned<Viewing>> {
        let viewings = Self::read(&self.viewings, "viewing")?;
        viewings
            .get(&id)
            .cloned()
            .ok_or(FunnelError::NotFound("viewing"))
    }

    fn update_viewing(&self, expected_version: u64, mut viewing: Viewing) -> FunnelResult<u64> {
        let mut viewings = Self::write(&self.viewings, "viewing")?;
        let entry = viewings
            .get_mut(&viewing.id)
            .ok_or(FunnelError::NotFound("viewing"))?;
        if entry.version != expected_version {
            return Err(FunnelError::Conflict(viewing.id));
        }
        viewing.updated_at = Utc::now();
        entry.version += 1;
        entry.record = viewing;
        Ok(entry.version)
    }

    fn viewings_for_property(&self, property_id: Uuid) -> FunnelResult<Vec<Viewing>> {
        let viewings = Self::read(&self.viewings, "viewing")?;
        let mut found: Vec<Viewing> = viewings
            .values()
            .filter(|v| v.record.property_id == property_id)
            .map(|v| v.record.clone())
            .collect();
        found.sort_by_key(|v| v.scheduled_date);
        Ok(found)
    }

    fn viewings_for_lead(&self, lead_id: Uuid) -> FunnelResult<Vec<Viewing>> {
        let viewings = Self::read(&self.viewings, "viewing")?;
        let mut found: Vec<Viewing> = viewings
            .values()
            .filter(|v| v.record.lead_id == lead_id)
            .map(|v| v.record.clone())
            .collect();
        found.sort_by_key(|v| v.scheduled_date);
        Ok(found)
    }

    fn viewings_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FunnelResult<Vec<Versioned<Viewing>>> {
        let viewings = Self::read(&self.viewings, "viewing")?;
        let mut found: Vec<Versioned<Viewing>> = viewings
            .values()
            .filter(|v| v.record.scheduled_date >= from && v.record.scheduled_date < to)
            .cloned()
            .collect();
        found.sort_by_key(|v| v.record.scheduled_date);
        Ok(found)
    }

    fn insert_property(&self, property: Property) -> FunnelResult<()> {
        let mut properties = Self::write(&self.properties, "property")?;
        properties.insert(property.id, property);
        Ok(())
    }

    fn property(&self, id: Uuid) -> FunnelResult<Property> {
        let properties = Self::read(&self.properties, "property")?;
        properties
            .get(&id)
            .cloned()
            .ok_or(FunnelError::NotFound("property"))
    }

    fn insert_user(&self, user: User) -> FunnelResult<()> {
        let mut users = Self::write(&self.users, "user")?;
        users.insert(user.id, user);
        Ok(())
    }

    fn user(&self, id: Uuid) -> FunnelResult<User> {
        let users = Self::read(&self.users, "user")?;
        users.get(&id).cloned().ok_or(FunnelError::NotFound("user"))
    }
}
