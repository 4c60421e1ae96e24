use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{RwLock, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::identity;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, validate_range};
use super::{BookingError, Engine, WalCommand, group_members};

impl Engine {
    // ── Catalog feed (owned by catalog management, external) ─────

    pub async fn register_item(
        &self,
        id: Ulid,
        name: String,
        category: Option<String>,
        daily_rate_cents: i64,
        status: ItemStatus,
    ) -> Result<(), BookingError> {
        if self.items.len() >= MAX_ITEMS {
            return Err(BookingError::LimitExceeded("too many items"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(BookingError::LimitExceeded("item name too long"));
        }
        if self.items.contains_key(&id) {
            return Err(BookingError::ItemAlreadyExists(id));
        }

        let event = Event::ItemRegistered {
            id,
            name: name.clone(),
            category: category.clone(),
            daily_rate_cents,
            status,
        };
        self.wal_append(&event)
            .await
            .map_err(BookingError::StoreWriteFailed)?;
        let state = ItemState::new(id, name, category, daily_rate_cents, status);
        self.items.insert(id, Arc::new(RwLock::new(state)));
        metrics::gauge!(observability::ITEMS_REGISTERED).set(self.items.len() as f64);
        self.notify.send(id, &event);
        Ok(())
    }

    /// Retiring or parking an item blocks new bookings; existing
    /// reservations stay untouched for fulfillment to resolve.
    pub async fn set_item_status(&self, id: Ulid, status: ItemStatus) -> Result<(), BookingError> {
        let item = self.get_item(&id).ok_or(BookingError::ItemNotFound(id))?;
        let mut guard = item.write().await;
        let event = Event::ItemStatusChanged { id, status };
        self.persist_and_apply(id, &mut guard, &event)
            .await
            .map_err(BookingError::StoreWriteFailed)
    }

    // ── Booking ──────────────────────────────────────────────────

    pub async fn create_booking(
        &self,
        request: BookingRequest,
    ) -> Result<BookingReceipt, BookingError> {
        let started = Instant::now();
        let result = self.create_booking_inner(&request).await;
        metrics::histogram!(observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!(observability::BOOKINGS_ACCEPTED_TOTAL, "kind" => "single")
                    .increment(1);
                info!(
                    reservation = %receipt.reservation_id,
                    item = %request.item_id,
                    "booking created"
                );
            }
            Err(e) => self.report_rejection("single", e, &request.email, request.start, request.end),
        }
        result
    }

    pub async fn create_bulk_booking(
        &self,
        request: BulkBookingRequest,
    ) -> Result<GroupReceipt, BookingError> {
        let started = Instant::now();
        let result = self.create_bulk_booking_inner(&request).await;
        metrics::histogram!(observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!(observability::BOOKINGS_ACCEPTED_TOTAL, "kind" => "group")
                    .increment(1);
                info!(
                    group = %receipt.group_id,
                    items = request.item_ids.len(),
                    "group booking created"
                );
            }
            Err(e) => self.report_rejection("group", e, &request.email, request.start, request.end),
        }
        result
    }

    fn report_rejection(
        &self,
        kind: &'static str,
        error: &BookingError,
        email: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) {
        metrics::counter!(
            observability::BOOKINGS_REJECTED_TOTAL,
            "kind" => kind,
            "reason" => error.kind_label()
        )
        .increment(1);
        if error.is_infrastructure() {
            tracing::warn!(email, %start, %end, error = %error, "booking failed");
        } else {
            tracing::debug!(error = %error, "booking rejected");
        }
    }

    /// Validation ladder, short-circuiting on the first failure:
    /// email shape → date sanity → access gate → availability (under the
    /// item write lock) → identity resolution → insert. Nothing is written
    /// before the availability check passes.
    async fn create_booking_inner(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingReceipt, BookingError> {
        let email = identity::normalize_email(&request.email);
        if email.len() > MAX_EMAIL_LEN || !identity::is_valid_email(&email) {
            return Err(BookingError::InvalidEmail);
        }
        let range = DateRange::new(request.start, request.end).ok_or(BookingError::InvalidDates)?;
        validate_range(&range)?;
        validate_request_text(&request.full_name, request.company_name.as_deref(), request.notes.as_deref())?;

        let settings = self
            .settings
            .snapshot()
            .await
            .map_err(|e| BookingError::SettingsUnavailable(e.to_string()))?;
        if !settings.gate_passes(request.access_password.as_deref()) {
            return Err(BookingError::AccessDenied);
        }
        let buffer = settings.effective_buffer_days();

        let item = self
            .get_item(&request.item_id)
            .ok_or(BookingError::ItemNotFound(request.item_id))?;
        let mut guard = item.write().await;
        if guard.status != ItemStatus::Active {
            return Err(BookingError::NotAvailable(request.item_id));
        }
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_ITEM {
            return Err(BookingError::LimitExceeded("too many reservations on item"));
        }
        check_no_conflict(&guard, &range, buffer)?;

        let customer_id = self
            .resolve_customer(&email, &request.full_name, request.company_name.as_deref())
            .await?;

        let id = Ulid::new();
        let event = Event::ReservationCreated {
            id,
            item_id: request.item_id,
            customer_id,
            range,
            group_id: None,
            notes: request.notes.clone(),
        };
        self.persist_and_apply(request.item_id, &mut guard, &event)
            .await
            .map_err(BookingError::ReservationWriteFailed)?;

        Ok(BookingReceipt { reservation_id: id })
    }

    /// All-or-nothing multi-item booking. Item locks are taken in sorted id
    /// order (no deadlocks) and held across validate-all + commit; the whole
    /// group is one WAL record, so neither a concurrent request nor a crash
    /// can observe a partial group.
    async fn create_bulk_booking_inner(
        &self,
        request: &BulkBookingRequest,
    ) -> Result<GroupReceipt, BookingError> {
        let email = identity::normalize_email(&request.email);
        if email.len() > MAX_EMAIL_LEN || !identity::is_valid_email(&email) {
            return Err(BookingError::InvalidEmail);
        }
        let range = DateRange::new(request.start, request.end).ok_or(BookingError::InvalidDates)?;
        validate_range(&range)?;
        validate_request_text(&request.full_name, request.company_name.as_deref(), request.notes.as_deref())?;

        if request.item_ids.is_empty() {
            return Err(BookingError::LimitExceeded("no items in request"));
        }
        if request.item_ids.len() > MAX_BATCH_ITEMS {
            return Err(BookingError::LimitExceeded("too many items in request"));
        }

        let settings = self
            .settings
            .snapshot()
            .await
            .map_err(|e| BookingError::SettingsUnavailable(e.to_string()))?;
        if !settings.gate_passes(request.access_password.as_deref()) {
            return Err(BookingError::AccessDenied);
        }
        let buffer = settings.effective_buffer_days();

        // Everything in the request shares one range, so a repeated item id
        // would overlap itself.
        let mut sorted_ids = request.item_ids.clone();
        sorted_ids.sort();
        if let Some(dup) = sorted_ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(BookingError::NotAvailable(dup[0]));
        }

        // Phase 1: lock in sorted order, validate every item.
        let mut guards = Vec::with_capacity(sorted_ids.len());
        let mut guard_index = HashMap::new();
        for item_id in &sorted_ids {
            let item = self
                .get_item(item_id)
                .ok_or(BookingError::ItemNotFound(*item_id))?;
            let guard = item.write_owned().await;
            if guard.status != ItemStatus::Active {
                return Err(BookingError::NotAvailable(*item_id));
            }
            if guard.reservations.len() >= MAX_RESERVATIONS_PER_ITEM {
                return Err(BookingError::LimitExceeded("too many reservations on item"));
            }
            check_no_conflict(&guard, &range, buffer)?;
            guard_index.insert(*item_id, guards.len());
            guards.push(guard);
        }

        let customer_id = self
            .resolve_customer(&email, &request.full_name, request.company_name.as_deref())
            .await?;

        // Phase 2: all validated — commit the group as one record.
        let group_id = Ulid::new();
        let entries: Vec<GroupEntry> = request
            .item_ids
            .iter()
            .map(|item_id| GroupEntry {
                reservation_id: Ulid::new(),
                item_id: *item_id,
            })
            .collect();
        let event = Event::ReservationGroupCreated {
            group_id,
            customer_id,
            range,
            notes: request.notes.clone(),
            entries: entries.clone(),
        };
        self.wal_append(&event)
            .await
            .map_err(BookingError::ReservationWriteFailed)?;

        for reservation in group_members(group_id, customer_id, range, &request.notes, &entries) {
            let guard = &mut guards[guard_index[&reservation.item_id]];
            self.reservation_to_item
                .insert(reservation.id, reservation.item_id);
            guard.insert_reservation(reservation);
        }
        self.groups
            .insert(group_id, entries.iter().map(|e| e.reservation_id).collect());
        for entry in &entries {
            self.notify.send(entry.item_id, &event);
        }

        Ok(GroupReceipt {
            group_id,
            reservation_ids: entries.iter().map(|e| e.reservation_id).collect(),
        })
    }

    // ── Identity resolution ──────────────────────────────────────

    /// One customer per normalized email. Existing profiles are reused;
    /// creation is serialized so racing first bookings can't split an
    /// identity in two.
    pub(super) async fn resolve_customer(
        &self,
        email: &str,
        full_name: &str,
        company_name: Option<&str>,
    ) -> Result<Ulid, BookingError> {
        if let Some(existing) = self.customers_by_email.get(email).map(|e| *e.value()) {
            self.maybe_backfill_domain(existing, email).await;
            return Ok(existing);
        }

        let _serialized = self.customer_create.lock().await;
        // Re-check: another request may have created the profile while we
        // waited for the lock.
        if let Some(existing) = self.customers_by_email.get(email).map(|e| *e.value()) {
            return Ok(existing);
        }

        let id = Ulid::new();
        let organization_domain = identity::organization_domain(email);
        let event = Event::CustomerCreated {
            id,
            email: email.to_string(),
            full_name: full_name.to_string(),
            company_name: company_name.map(str::to_string),
            organization_domain: organization_domain.clone(),
            role: CustomerRole::Customer,
        };
        self.wal_append(&event)
            .await
            .map_err(BookingError::ProfileWriteFailed)?;
        self.customers.insert(
            id,
            Customer {
                id,
                email: email.to_string(),
                full_name: full_name.to_string(),
                company_name: company_name.map(str::to_string),
                organization_domain,
                role: CustomerRole::Customer,
            },
        );
        self.customers_by_email.insert(email.to_string(), id);
        metrics::counter!(observability::CUSTOMERS_CREATED_TOTAL).increment(1);
        info!(customer = %id, "customer profile created");
        Ok(id)
    }

    /// Fill in an organization domain that was null when the profile was
    /// first stored. Never overwrites a non-null value, and never blocks the
    /// booking: a failed backfill is logged and dropped.
    async fn maybe_backfill_domain(&self, customer_id: Ulid, email: &str) {
        let is_null = self
            .customers
            .get(&customer_id)
            .is_some_and(|c| c.organization_domain.is_none());
        if !is_null {
            return;
        }
        let Some(domain) = identity::organization_domain(email) else {
            return;
        };

        let event = Event::CustomerDomainBackfilled {
            id: customer_id,
            organization_domain: domain.clone(),
        };
        if let Err(e) = self.wal_append(&event).await {
            tracing::warn!(customer = %customer_id, "organization domain backfill failed: {e}");
            return;
        }
        if let Some(mut customer) = self.customers.get_mut(&customer_id) {
            customer.organization_domain = Some(domain);
        }
    }

    // ── Reservation lifecycle (triggered by fulfillment workflows) ──

    pub async fn confirm_reservation(&self, id: Ulid) -> Result<(), BookingError> {
        self.transition_reservation(id, ReservationStatus::Confirmed)
            .await
    }

    /// The item left the shop with the customer.
    pub async fn dispatch_reservation(&self, id: Ulid) -> Result<(), BookingError> {
        self.transition_reservation(id, ReservationStatus::Active)
            .await
    }

    /// The item is back; the dates free up immediately.
    pub async fn return_reservation(&self, id: Ulid) -> Result<(), BookingError> {
        self.transition_reservation(id, ReservationStatus::Returned)
            .await
    }

    pub async fn cancel_reservation(&self, id: Ulid) -> Result<(), BookingError> {
        self.transition_reservation(id, ReservationStatus::Cancelled)
            .await
    }

    async fn transition_reservation(
        &self,
        id: Ulid,
        next: ReservationStatus,
    ) -> Result<(), BookingError> {
        let (item_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let current = guard
            .find_reservation(&id)
            .ok_or(BookingError::ReservationNotFound(id))?
            .status;
        if !current.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let event = Event::ReservationStatusChanged {
            id,
            item_id,
            status: next,
        };
        self.persist_and_apply(item_id, &mut guard, &event)
            .await
            .map_err(BookingError::ReservationWriteFailed)?;
        info!(reservation = %id, ?next, "reservation status changed");
        Ok(())
    }

    /// Cancel every member of a group that is still cancellable. Members
    /// already returned or cancelled are left alone. Returns the ids that
    /// were cancelled by this call.
    pub async fn cancel_group(&self, group_id: Ulid) -> Result<Vec<Ulid>, BookingError> {
        let members = self
            .groups
            .get(&group_id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::GroupNotFound(group_id))?;

        let mut cancelled = Vec::new();
        for member in members {
            match self.cancel_reservation(member).await {
                Ok(()) => cancelled.push(member),
                Err(BookingError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(cancelled)
    }

    // ── WAL maintenance ──────────────────────────────────────────

    /// Rewrite the WAL as the minimal event set recreating current state:
    /// profiles with their current domains, items with their current
    /// statuses, every reservation (groups flatten to rows — the group id on
    /// each row preserves membership).
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let mut events = Vec::new();

        for entry in self.customers.iter() {
            let c = entry.value();
            events.push(Event::CustomerCreated {
                id: c.id,
                email: c.email.clone(),
                full_name: c.full_name.clone(),
                company_name: c.company_name.clone(),
                organization_domain: c.organization_domain.clone(),
                role: c.role,
            });
        }

        let item_ids: Vec<Ulid> = self.items.iter().map(|e| *e.key()).collect();
        for id in item_ids {
            let Some(item) = self.get_item(&id) else {
                continue;
            };
            let guard = item.read().await;
            events.push(Event::ItemRegistered {
                id: guard.id,
                name: guard.name.clone(),
                category: guard.category.clone(),
                daily_rate_cents: guard.daily_rate_cents,
                status: guard.status,
            });
            for r in &guard.reservations {
                events.push(Event::ReservationCreated {
                    id: r.id,
                    item_id: r.item_id,
                    customer_id: r.customer_id,
                    range: r.range,
                    group_id: r.group_id,
                    notes: r.notes.clone(),
                });
                if r.status != ReservationStatus::Pending {
                    events.push(Event::ReservationStatusChanged {
                        id: r.id,
                        item_id: r.item_id,
                        status: r.status,
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| BookingError::StoreWriteFailed("wal writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::StoreWriteFailed("wal writer dropped response".into()))?
            .map_err(|e| BookingError::StoreWriteFailed(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn validate_request_text(
    full_name: &str,
    company_name: Option<&str>,
    notes: Option<&str>,
) -> Result<(), BookingError> {
    if full_name.len() > MAX_NAME_LEN {
        return Err(BookingError::LimitExceeded("name too long"));
    }
    if company_name.is_some_and(|c| c.len() > MAX_NAME_LEN) {
        return Err(BookingError::LimitExceeded("company name too long"));
    }
    if notes.is_some_and(|n| n.len() > MAX_NOTES_LEN) {
        return Err(BookingError::LimitExceeded("notes too long"));
    }
    Ok(())
}
