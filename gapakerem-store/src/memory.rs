use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

use gapakerem_catalog::{Guide, OpenTrip, Porter, PrivateTrip, Trip, TripType};
use gapakerem_core::booking::{NewPrivateTripBooking, NewTripBooking, PrivateTripBooking, TripBooking};
use gapakerem_core::feedback::{Feedback, FeedbackListing, NewFeedback};
use gapakerem_core::payment::PaymentStatus;
use gapakerem_core::repository::{ReferenceStore, StoreResult, StoreTx};
use gapakerem_core::search::{BookingFilter, BookingListing, Pagination};
use gapakerem_core::stats::{BookingScope, BookingTotals, MountainTotals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PorterLink {
    id_private_trip_booking: i32,
    id_porter: i32,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    trips: BTreeMap<i32, Trip>,
    open_trips: BTreeMap<i32, OpenTrip>,
    /// (id_open_trip, id_porter)
    open_trip_porters: Vec<(i32, i32)>,
    private_trips: BTreeMap<i32, PrivateTrip>,
    guides: BTreeMap<i32, Guide>,
    porters: BTreeMap<i32, Porter>,
    bookings: BTreeMap<i32, TripBooking>,
    private_bookings: BTreeMap<i32, PrivateTripBooking>,
    porter_links: Vec<PorterLink>,
    feedbacks: BTreeMap<i32, Feedback>,
}

fn next_id<V>(map: &BTreeMap<i32, V>) -> i32 {
    map.keys().next_back().map_or(1, |id| id + 1)
}

fn window(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// In-process reference store.
///
/// Transactions are serialized: `begin` takes the table lock and works on a
/// private copy that `commit` publishes. Dropping a transaction discards the
/// copy, which gives the same all-or-nothing behaviour as the Postgres store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<StdMutex<HashSet<&'static str>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to the named [`StoreTx`] method fail once
    pub fn inject_fault(&self, operation: &'static str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(operation);
        }
    }

    // Fixtures. Reference data is managed outside the booking engine, so
    // these only exist to seed the store.

    pub async fn add_trip(&self, trip: Trip) {
        self.tables.lock().await.trips.insert(trip.id, trip);
    }

    pub async fn add_open_trip(&self, open_trip: OpenTrip, porter_ids: &[i32]) {
        let mut tables = self.tables.lock().await;
        for id_porter in porter_ids {
            tables.open_trip_porters.push((open_trip.id, *id_porter));
        }
        tables.open_trips.insert(open_trip.id, open_trip);
    }

    pub async fn add_private_trip(&self, private_trip: PrivateTrip) {
        self.tables.lock().await.private_trips.insert(private_trip.id, private_trip);
    }

    pub async fn add_guide(&self, guide: Guide) {
        self.tables.lock().await.guides.insert(guide.id, guide);
    }

    pub async fn add_porter(&self, porter: Porter) {
        self.tables.lock().await.porters.insert(porter.id, porter);
    }

    /// Insert a booking row as-is, e.g. with a back-dated `created_at`
    pub async fn add_booking(&self, booking: TripBooking) {
        self.tables.lock().await.bookings.insert(booking.id, booking);
    }

    pub async fn trip(&self, id: i32) -> Option<Trip> {
        self.tables.lock().await.trips.get(&id).cloned()
    }

    pub async fn booking(&self, id: i32) -> Option<TripBooking> {
        self.tables.lock().await.bookings.get(&id).cloned()
    }

    /// Row counts of (bookings, private bookings, porter links)
    pub async fn booking_row_counts(&self) -> (usize, usize, usize) {
        let tables = self.tables.lock().await;
        (
            tables.bookings.len(),
            tables.private_bookings.len(),
            tables.porter_links.len(),
        )
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            faults: self.faults.clone(),
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    faults: Arc<StdMutex<HashSet<&'static str>>>,
}

impl MemoryTx {
    fn check_fault(&self, operation: &'static str) -> StoreResult<()> {
        let triggered = self
            .faults
            .lock()
            .map(|mut faults| faults.remove(operation))
            .unwrap_or(false);
        if triggered {
            return Err(format!("injected failure in {}", operation).into());
        }
        Ok(())
    }

    fn porters_by_id(&self, ids: impl Iterator<Item = i32>) -> Vec<Porter> {
        let mut porters: Vec<Porter> = ids
            .filter_map(|id| self.work.porters.get(&id).cloned())
            .collect();
        porters.sort_by_key(|p| p.id);
        porters
    }

    fn mountain_name(&self, id_trip: i32) -> String {
        self.work
            .trips
            .get(&id_trip)
            .map(|t| t.mountain_name.clone())
            .unwrap_or_default()
    }

    fn booking_mut(&mut self, id: i32) -> StoreResult<&mut TripBooking> {
        self.work
            .bookings
            .get_mut(&id)
            .ok_or_else(|| format!("booking {} does not exist", id).into())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_trip(&mut self, id: i32) -> StoreResult<Option<Trip>> {
        self.check_fault("find_trip")?;
        Ok(self.work.trips.get(&id).cloned())
    }

    async fn find_open_trip(&mut self, id_trip: i32) -> StoreResult<Option<OpenTrip>> {
        Ok(self.work.open_trips.values().find(|o| o.id_trip == id_trip).cloned())
    }

    async fn find_private_trip(&mut self, id_trip: i32) -> StoreResult<Option<PrivateTrip>> {
        Ok(self.work.private_trips.values().find(|p| p.id_trip == id_trip).cloned())
    }

    async fn find_guide(&mut self, id: i32) -> StoreResult<Option<Guide>> {
        Ok(self.work.guides.get(&id).cloned())
    }

    async fn find_porters(&mut self, ids: &[i32]) -> StoreResult<Vec<Porter>> {
        let unique: HashSet<i32> = ids.iter().copied().collect();
        Ok(self.porters_by_id(unique.into_iter()))
    }

    async fn open_trip_porters(&mut self, id_open_trip: i32) -> StoreResult<Vec<Porter>> {
        let ids: Vec<i32> = self
            .work
            .open_trip_porters
            .iter()
            .filter(|(open_trip, _)| *open_trip == id_open_trip)
            .map(|(_, porter)| *porter)
            .collect();
        Ok(self.porters_by_id(ids.into_iter()))
    }

    async fn increment_trip_participants(&mut self, id_trip: i32, delta: i32) -> StoreResult<()> {
        self.check_fault("increment_trip_participants")?;
        let trip = self
            .work
            .trips
            .get_mut(&id_trip)
            .ok_or_else(|| format!("trip {} does not exist", id_trip))?;
        trip.total_participants = trip
            .total_participants
            .checked_add(delta)
            .ok_or_else(|| format!("participant count of trip {} out of range", id_trip))?;
        Ok(())
    }

    async fn count_trips(&mut self, trip_type: TripType) -> StoreResult<i64> {
        Ok(self.work.trips.values().filter(|t| t.trip_type == trip_type).count() as i64)
    }

    async fn insert_booking(&mut self, booking: &NewTripBooking) -> StoreResult<TripBooking> {
        self.check_fault("insert_booking")?;
        let row = TripBooking {
            id: next_id(&self.work.bookings),
            id_user: booking.id_user,
            id_trip: booking.id_trip,
            trip_type: booking.trip_type,
            total_participants: booking.total_participants,
            name_participants: booking.name_participants.clone(),
            no_hp: booking.no_hp.clone(),
            meeting_point: booking.meeting_point.clone(),
            total_price: booking.total_price,
            payment_proof: None,
            payment_status: PaymentStatus::Unpaid,
            created_at: Utc::now(),
        };
        self.work.bookings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_private_booking(
        &mut self,
        detail: &NewPrivateTripBooking,
    ) -> StoreResult<PrivateTripBooking> {
        self.check_fault("insert_private_booking")?;
        let row = PrivateTripBooking {
            id: next_id(&self.work.private_bookings),
            id_trip_booking: detail.id_trip_booking,
            id_guide: detail.id_guide,
            total_days: detail.total_days,
            start_date: detail.start_date,
        };
        self.work.private_bookings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_porter_links(
        &mut self,
        id_private_trip_booking: i32,
        porter_ids: &[i32],
    ) -> StoreResult<u64> {
        self.check_fault("insert_porter_links")?;
        for id_porter in porter_ids {
            self.work.porter_links.push(PorterLink {
                id_private_trip_booking,
                id_porter: *id_porter,
            });
        }
        Ok(porter_ids.len() as u64)
    }

    async fn find_booking(&mut self, id: i32) -> StoreResult<Option<TripBooking>> {
        Ok(self.work.bookings.get(&id).cloned())
    }

    async fn lock_booking(&mut self, id: i32) -> StoreResult<Option<TripBooking>> {
        // The whole store is already held by this transaction.
        self.find_booking(id).await
    }

    async fn find_private_booking(
        &mut self,
        id_trip_booking: i32,
    ) -> StoreResult<Option<PrivateTripBooking>> {
        Ok(self
            .work
            .private_bookings
            .values()
            .find(|p| p.id_trip_booking == id_trip_booking)
            .cloned())
    }

    async fn private_booking_porters(
        &mut self,
        id_private_trip_booking: i32,
    ) -> StoreResult<Vec<Porter>> {
        let ids: Vec<i32> = self
            .work
            .porter_links
            .iter()
            .filter(|link| link.id_private_trip_booking == id_private_trip_booking)
            .map(|link| link.id_porter)
            .collect();
        Ok(self.porters_by_id(ids.into_iter()))
    }

    async fn set_payment_proof(
        &mut self,
        id: i32,
        url: &str,
        status: PaymentStatus,
    ) -> StoreResult<TripBooking> {
        self.check_fault("set_payment_proof")?;
        let booking = self.booking_mut(id)?;
        booking.payment_proof = Some(url.to_string());
        booking.payment_status = status;
        Ok(booking.clone())
    }

    async fn set_payment_status(&mut self, id: i32, status: PaymentStatus) -> StoreResult<TripBooking> {
        self.check_fault("set_payment_status")?;
        let booking = self.booking_mut(id)?;
        booking.payment_status = status;
        Ok(booking.clone())
    }

    async fn count_bookings(&mut self, filter: &BookingFilter) -> StoreResult<i64> {
        Ok(self.work.bookings.values().filter(|b| filter.matches(b)).count() as i64)
    }

    async fn list_bookings(
        &mut self,
        filter: &BookingFilter,
        page: Option<&Pagination>,
    ) -> StoreResult<Vec<BookingListing>> {
        let (skip, take) = match page {
            Some(p) => (window(p.offset()), window(u64::from(p.limit()))),
            None => (0, usize::MAX),
        };
        let listings = self
            .work
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .skip(skip)
            .take(take)
            .map(|b| BookingListing {
                booking: b.clone(),
                mountain_name: self.mountain_name(b.id_trip),
            })
            .collect();
        Ok(listings)
    }

    async fn booking_totals(&mut self, scope: &BookingScope) -> StoreResult<BookingTotals> {
        let totals = self
            .work
            .bookings
            .values()
            .filter(|b| scope.matches(b))
            .fold(BookingTotals::default(), |mut acc, b| {
                acc.bookings += 1;
                acc.participants += i64::from(b.total_participants);
                acc.revenue += b.total_price;
                acc
            });
        Ok(totals)
    }

    async fn mountain_totals(&mut self, scope: &BookingScope) -> StoreResult<Vec<MountainTotals>> {
        let mut grouped: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for booking in self.work.bookings.values().filter(|b| scope.matches(b)) {
            let entry = grouped.entry(self.mountain_name(booking.id_trip)).or_default();
            entry.0 += i64::from(booking.total_participants);
            entry.1 += booking.total_price;
        }
        Ok(grouped
            .into_iter()
            .map(|(mountain_name, (total_participants, total_price))| MountainTotals {
                mountain_name,
                total_participants,
                total_price,
            })
            .collect())
    }

    async fn find_feedback(&mut self, id_trip_booking: i32) -> StoreResult<Option<Feedback>> {
        Ok(self
            .work
            .feedbacks
            .values()
            .find(|f| f.id_trip_booking == id_trip_booking)
            .cloned())
    }

    async fn insert_feedback(&mut self, feedback: &NewFeedback) -> StoreResult<Feedback> {
        if self
            .work
            .feedbacks
            .values()
            .any(|f| f.id_trip_booking == feedback.id_trip_booking)
        {
            return Err(format!(
                "feedback for booking {} already exists",
                feedback.id_trip_booking
            )
            .into());
        }
        let row = Feedback {
            id: next_id(&self.work.feedbacks),
            id_trip_booking: feedback.id_trip_booking,
            message: feedback.message.clone(),
            rating: feedback.rating,
            created_at: Utc::now(),
        };
        self.work.feedbacks.insert(row.id, row.clone());
        Ok(row)
    }

    async fn count_feedback(&mut self) -> StoreResult<i64> {
        Ok(self.work.feedbacks.len() as i64)
    }

    async fn list_feedback(&mut self, page: &Pagination) -> StoreResult<Vec<FeedbackListing>> {
        let listings = self
            .work
            .feedbacks
            .values()
            .skip(window(page.offset()))
            .take(window(u64::from(page.limit())))
            .map(|feedback| {
                let trip = self
                    .work
                    .bookings
                    .get(&feedback.id_trip_booking)
                    .and_then(|b| self.work.trips.get(&b.id_trip));
                FeedbackListing {
                    feedback: feedback.clone(),
                    mountain_name: trip.map(|t| t.mountain_name.clone()).unwrap_or_default(),
                    mountain_photo: trip.and_then(|t| t.mountain_photo.clone()),
                }
            })
            .collect();
        Ok(listings)
    }

    async fn average_rating(&mut self, id_trip: i32) -> StoreResult<Option<f64>> {
        let ratings: Vec<i32> = self
            .work
            .feedbacks
            .values()
            .filter(|f| {
                self.work
                    .bookings
                    .get(&f.id_trip_booking)
                    .is_some_and(|b| b.id_trip == id_trip)
            })
            .map(|f| f.rating)
            .collect();
        if ratings.is_empty() {
            return Ok(None);
        }
        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        Ok(Some(sum as f64 / ratings.len() as f64))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work, .. } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(id: i32) -> Trip {
        Trip {
            id,
            mountain_name: "Semeru".to_string(),
            mountain_photo: None,
            price: 100,
            trip_type: TripType::Open,
            total_participants: 0,
            equipment: "Carrier".to_string(),
            estimation_time: "2 days".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        store.add_trip(trip(1)).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.increment_trip_participants(1, 5).await.unwrap();
        }

        assert_eq!(store.trip(1).await.unwrap().total_participants, 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        store.add_trip(trip(1)).await;

        let mut tx = store.begin().await.unwrap();
        tx.increment_trip_participants(1, 5).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.trip(1).await.unwrap().total_participants, 5);
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let store = MemoryStore::new();
        store.add_trip(trip(1)).await;
        store.inject_fault("find_trip");

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_trip(1).await.is_err());
        assert!(tx.find_trip(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_increment_overflow_is_an_error() {
        let store = MemoryStore::new();
        store.add_trip(Trip { total_participants: i32::MAX - 1, ..trip(1) }).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.increment_trip_participants(1, 2).await.is_err());
        tx.increment_trip_participants(1, 1).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.trip(1).await.unwrap().total_participants, i32::MAX);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let page = Pagination::new(Some(i64::MAX), Some(i64::MAX));
        let listed = tx.list_bookings(&BookingFilter::default(), Some(&page)).await.unwrap();
        assert!(listed.is_empty());
        assert!(tx.list_feedback(&page).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_porters_skips_unknown_ids() {
        let store = MemoryStore::new();
        store.add_porter(Porter { id: 1, name: "Made".to_string(), photo: None }).await;

        let mut tx = store.begin().await.unwrap();
        let porters = tx.find_porters(&[1, 99]).await.unwrap();
        assert_eq!(porters.len(), 1);
    }
}
