use chrono::NaiveDate;
use ulid::Ulid;

use crate::identity;
use crate::model::*;

use super::availability::{blocked_windows, merge_contiguous};
use super::conflict::{check_no_conflict, validate_range};
use super::{BookingError, Engine};

impl Engine {
    /// Advisory availability check for catalog pages. The result can go
    /// stale the moment it is returned; the booking path re-checks under the
    /// item write lock.
    pub async fn is_available(
        &self,
        item_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, BookingError> {
        let range = DateRange::new(start, end).ok_or(BookingError::InvalidDates)?;
        validate_range(&range)?;
        let settings = self
            .settings
            .snapshot()
            .await
            .map_err(|e| BookingError::SettingsUnavailable(e.to_string()))?;

        let item = self
            .get_item(&item_id)
            .ok_or(BookingError::ItemNotFound(item_id))?;
        let guard = item.read().await;
        if guard.status != ItemStatus::Active {
            return Ok(false);
        }
        Ok(check_no_conflict(&guard, &range, settings.effective_buffer_days()).is_ok())
    }

    /// Buffer-extended blocked windows, merged, for client-side calendars.
    pub async fn unavailable_ranges(&self, item_id: Ulid) -> Result<Vec<DateRange>, BookingError> {
        let settings = self
            .settings
            .snapshot()
            .await
            .map_err(|e| BookingError::SettingsUnavailable(e.to_string()))?;

        let item = self
            .get_item(&item_id)
            .ok_or(BookingError::ItemNotFound(item_id))?;
        let guard = item.read().await;
        let windows = blocked_windows(&guard.reservations, settings.effective_buffer_days());
        Ok(merge_contiguous(&windows))
    }

    pub async fn list_items(&self) -> Vec<ItemInfo> {
        let handles: Vec<_> = self.items.iter().map(|e| e.value().clone()).collect();
        let mut infos = Vec::with_capacity(handles.len());
        for item in handles {
            let guard = item.read().await;
            infos.push(ItemInfo {
                id: guard.id,
                name: guard.name.clone(),
                category: guard.category.clone(),
                daily_rate_cents: guard.daily_rate_cents,
                status: guard.status,
            });
        }
        infos
    }

    pub async fn item_info(&self, item_id: Ulid) -> Option<ItemInfo> {
        let item = self.get_item(&item_id)?;
        let guard = item.read().await;
        Some(ItemInfo {
            id: guard.id,
            name: guard.name.clone(),
            category: guard.category.clone(),
            daily_rate_cents: guard.daily_rate_cents,
            status: guard.status,
        })
    }

    /// Every reservation ever taken on the item, any status. Unknown items
    /// yield an empty list.
    pub async fn reservations_for_item(&self, item_id: Ulid) -> Vec<Reservation> {
        let Some(item) = self.get_item(&item_id) else {
            return Vec::new();
        };
        let guard = item.read().await;
        guard.reservations.clone()
    }

    pub async fn get_reservation(&self, reservation_id: Ulid) -> Option<Reservation> {
        let item_id = self.item_for_reservation(&reservation_id)?;
        let item = self.get_item(&item_id)?;
        let guard = item.read().await;
        guard.find_reservation(&reservation_id).cloned()
    }

    /// Members of a bulk booking, in creation order. Unknown groups yield an
    /// empty list.
    pub async fn reservations_for_group(&self, group_id: Ulid) -> Vec<Reservation> {
        let members = match self.groups.get(&group_id) {
            Some(e) => e.value().clone(),
            None => return Vec::new(),
        };
        let mut reservations = Vec::with_capacity(members.len());
        for member in members {
            if let Some(r) = self.get_reservation(member).await {
                reservations.push(r);
            }
        }
        reservations
    }

    pub fn get_customer(&self, customer_id: Ulid) -> Option<Customer> {
        self.customers.get(&customer_id).map(|e| e.value().clone())
    }

    /// Lookup by raw email; normalization is applied before the index read.
    pub fn find_customer(&self, email: &str) -> Option<Customer> {
        let normalized = identity::normalize_email(email);
        let id = *self.customers_by_email.get(&normalized)?;
        self.get_customer(id)
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }
}
