//! Procurement schema: RFQs, bids, negotiations, purchase orders, their
//! status history, document sequences and notifications.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: SOURCING
        // ============================================================
        db.execute_unprepared(RFQS_SQL).await?;
        db.execute_unprepared(BIDS_SQL).await?;

        // ============================================================
        // PART 3: NEGOTIATION
        // ============================================================
        db.execute_unprepared(NEGOTIATIONS_SQL).await?;
        db.execute_unprepared(NEGOTIATION_MESSAGES_SQL).await?;

        // ============================================================
        // PART 4: PURCHASE ORDERS
        // ============================================================
        db.execute_unprepared(PURCHASE_ORDERS_SQL).await?;
        db.execute_unprepared(PURCHASE_ORDER_MODIFICATIONS_SQL).await?;

        // ============================================================
        // PART 5: HISTORY, NUMBERING, NOTIFICATIONS
        // ============================================================
        db.execute_unprepared(STATUS_HISTORY_SQL).await?;
        db.execute_unprepared(DOCUMENT_SEQUENCES_SQL).await?;
        db.execute_unprepared(NOTIFICATIONS_SQL).await?;
        db.execute_unprepared(COMPANY_CONTACTS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE rfq_status AS ENUM (
    'draft',
    'published',
    'bidding_open',
    'bidding_closed',
    'under_evaluation',
    'awarded',
    'completed',
    'cancelled'
);

CREATE TYPE bid_status AS ENUM (
    'draft',
    'submitted',
    'under_review',
    'awarded',
    'rejected',
    'withdrawn'
);

CREATE TYPE negotiation_status AS ENUM ('active', 'closed', 'cancelled');

CREATE TYPE negotiation_message_type AS ENUM (
    'text',
    'counter_offer',
    'acceptance',
    'rejection'
);

CREATE TYPE offer_status AS ENUM ('accepted', 'rejected', 'cancelled');

CREATE TYPE purchase_order_status AS ENUM (
    'draft',
    'pending_approval',
    'approved',
    'rejected',
    'sent_to_supplier',
    'acknowledged',
    'in_progress',
    'delivered',
    'completed',
    'cancelled'
);

CREATE TYPE modification_status AS ENUM ('pending', 'approved', 'rejected');
";

const RFQS_SQL: &str = r"
CREATE TABLE rfqs (
    id UUID PRIMARY KEY,
    reference_number VARCHAR(32) NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    company_id UUID NOT NULL,
    created_by UUID NOT NULL,
    status rfq_status NOT NULL DEFAULT 'draft',
    bid_deadline TIMESTAMPTZ,
    delivery_date TIMESTAMPTZ,
    items JSONB NOT NULL DEFAULT '[]',
    invited_suppliers JSONB NOT NULL DEFAULT '[]',
    awarded_supplier_id UUID,
    awarded_bid_id UUID,
    cancellation_reason TEXT,
    published_at TIMESTAMPTZ,
    awarded_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    version BIGINT NOT NULL DEFAULT 0,
    CHECK (bid_deadline IS NULL OR delivery_date IS NULL OR bid_deadline < delivery_date)
);

CREATE INDEX idx_rfqs_company_status ON rfqs(company_id, status);
";

const BIDS_SQL: &str = r"
CREATE TABLE bids (
    id UUID PRIMARY KEY,
    bid_number VARCHAR(32) NOT NULL UNIQUE,
    rfq_id UUID NOT NULL REFERENCES rfqs(id) ON DELETE CASCADE,
    supplier_company_id UUID NOT NULL,
    submitted_by UUID NOT NULL,
    status bid_status NOT NULL DEFAULT 'draft',
    items JSONB NOT NULL DEFAULT '[]',
    total_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    currency CHAR(3) NOT NULL DEFAULT 'USD',
    notes TEXT,
    submitted_at TIMESTAMPTZ,
    technical_score NUMERIC(5, 2),
    commercial_score NUMERIC(5, 2),
    delivery_score NUMERIC(5, 2),
    total_score NUMERIC(5, 2),
    evaluation_notes TEXT,
    evaluated_by UUID,
    evaluated_at TIMESTAMPTZ,
    rejection_reason TEXT,
    awarded_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    version BIGINT NOT NULL DEFAULT 0,
    UNIQUE (rfq_id, supplier_company_id)
);

CREATE INDEX idx_bids_supplier ON bids(supplier_company_id);
CREATE UNIQUE INDEX idx_bids_one_award ON bids(rfq_id) WHERE status = 'awarded';
";

const NEGOTIATIONS_SQL: &str = r"
CREATE TABLE negotiations (
    id UUID PRIMARY KEY,
    bid_id UUID NOT NULL UNIQUE REFERENCES bids(id) ON DELETE CASCADE,
    rfq_id UUID NOT NULL REFERENCES rfqs(id) ON DELETE CASCADE,
    initiator_id UUID NOT NULL,
    supplier_user_id UUID NOT NULL,
    status negotiation_status NOT NULL DEFAULT 'active',
    pending_offer_message_id UUID,
    accepted_offer_message_id UUID,
    last_activity_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    closed_at TIMESTAMPTZ,
    purchase_order_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    version BIGINT NOT NULL DEFAULT 0
);

CREATE INDEX idx_negotiations_participants ON negotiations(initiator_id, supplier_user_id);
";

const NEGOTIATION_MESSAGES_SQL: &str = r"
CREATE TABLE negotiation_messages (
    id UUID PRIMARY KEY,
    negotiation_id UUID NOT NULL REFERENCES negotiations(id) ON DELETE CASCADE,
    sender_id UUID NOT NULL,
    message_type negotiation_message_type NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    offer_data JSONB,
    offer_status offer_status,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_negotiation_messages_thread ON negotiation_messages(negotiation_id, created_at);
";

const PURCHASE_ORDERS_SQL: &str = r"
CREATE TABLE purchase_orders (
    id UUID PRIMARY KEY,
    po_number VARCHAR(32) NOT NULL UNIQUE,
    bid_id UUID NOT NULL UNIQUE REFERENCES bids(id),
    rfq_id UUID NOT NULL REFERENCES rfqs(id),
    negotiation_id UUID REFERENCES negotiations(id),
    buyer_company_id UUID NOT NULL,
    supplier_company_id UUID NOT NULL,
    created_by UUID NOT NULL,
    status purchase_order_status NOT NULL,
    total_amount NUMERIC(19, 4) NOT NULL,
    currency CHAR(3) NOT NULL,
    approved_amount NUMERIC(19, 4),
    current_approval_step INTEGER NOT NULL DEFAULT 0,
    approved_by UUID,
    approved_at TIMESTAMPTZ,
    delivery_address TEXT,
    payment_terms TEXT,
    notes TEXT,
    internal_notes TEXT,
    terms_and_conditions TEXT,
    expected_delivery_date DATE,
    actual_delivery_date TIMESTAMPTZ,
    sent_at TIMESTAMPTZ,
    acknowledged_at TIMESTAMPTZ,
    rejection_reason TEXT,
    cancellation_reason TEXT,
    negotiated_terms JSONB,
    delivery_evidence JSONB,
    items JSONB NOT NULL DEFAULT '[]',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    version BIGINT NOT NULL DEFAULT 0,
    CHECK (total_amount > 0)
);

CREATE INDEX idx_purchase_orders_buyer ON purchase_orders(buyer_company_id, status);
CREATE INDEX idx_purchase_orders_supplier ON purchase_orders(supplier_company_id, status);
";

const PURCHASE_ORDER_MODIFICATIONS_SQL: &str = r"
CREATE TABLE purchase_order_modifications (
    id UUID PRIMARY KEY,
    purchase_order_id UUID NOT NULL REFERENCES purchase_orders(id) ON DELETE CASCADE,
    field VARCHAR(64) NOT NULL,
    old_value TEXT,
    new_value TEXT,
    reason TEXT,
    status modification_status NOT NULL DEFAULT 'pending',
    requested_by UUID NOT NULL,
    reviewed_by UUID,
    reviewed_at TIMESTAMPTZ,
    review_notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    version BIGINT NOT NULL DEFAULT 0
);

CREATE INDEX idx_po_modifications_order ON purchase_order_modifications(purchase_order_id, created_at);
";

const STATUS_HISTORY_SQL: &str = r"
CREATE TABLE rfq_status_history (
    id UUID PRIMARY KEY,
    rfq_id UUID NOT NULL REFERENCES rfqs(id) ON DELETE CASCADE,
    from_status rfq_status,
    to_status rfq_status NOT NULL,
    changed_by UUID NOT NULL,
    changed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    metadata JSONB NOT NULL DEFAULT '{}'
);

CREATE INDEX idx_rfq_status_history_rfq ON rfq_status_history(rfq_id, changed_at);

CREATE TABLE purchase_order_status_history (
    id UUID PRIMARY KEY,
    purchase_order_id UUID NOT NULL REFERENCES purchase_orders(id) ON DELETE CASCADE,
    from_status purchase_order_status,
    to_status purchase_order_status NOT NULL,
    changed_by UUID NOT NULL,
    changed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    metadata JSONB NOT NULL DEFAULT '{}'
);

CREATE INDEX idx_po_status_history_order ON purchase_order_status_history(purchase_order_id, changed_at);
";

const DOCUMENT_SEQUENCES_SQL: &str = r"
CREATE TABLE document_sequences (
    kind VARCHAR(32) NOT NULL,
    year INTEGER NOT NULL,
    last_value BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (kind, year)
);
";

const NOTIFICATIONS_SQL: &str = r"
CREATE TABLE notifications (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    notification_type VARCHAR(64) NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    recipient_user_id UUID,
    recipient_company_id UUID,
    related_user_id UUID,
    related_entity_id UUID NOT NULL,
    related_entity_type VARCHAR(64) NOT NULL,
    read_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK ((recipient_user_id IS NULL) <> (recipient_company_id IS NULL))
);

CREATE INDEX idx_notifications_user ON notifications(recipient_user_id, created_at) WHERE recipient_user_id IS NOT NULL;
CREATE INDEX idx_notifications_company ON notifications(recipient_company_id, created_at) WHERE recipient_company_id IS NOT NULL;
";

const COMPANY_CONTACTS_SQL: &str = r"
CREATE TABLE company_contacts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL,
    user_id UUID,
    email VARCHAR(255) NOT NULL,
    full_name TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (company_id, email)
);

CREATE INDEX idx_company_contacts_user ON company_contacts(user_id) WHERE user_id IS NOT NULL;
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS company_contacts CASCADE;
DROP TABLE IF EXISTS notifications CASCADE;
DROP TABLE IF EXISTS document_sequences CASCADE;
DROP TABLE IF EXISTS purchase_order_status_history CASCADE;
DROP TABLE IF EXISTS rfq_status_history CASCADE;
DROP TABLE IF EXISTS purchase_order_modifications CASCADE;
DROP TABLE IF EXISTS purchase_orders CASCADE;
DROP TABLE IF EXISTS negotiation_messages CASCADE;
DROP TABLE IF EXISTS negotiations CASCADE;
DROP TABLE IF EXISTS bids CASCADE;
DROP TABLE IF EXISTS rfqs CASCADE;

DROP TYPE IF EXISTS modification_status;
DROP TYPE IF EXISTS purchase_order_status;
DROP TYPE IF EXISTS offer_status;
DROP TYPE IF EXISTS negotiation_message_type;
DROP TYPE IF EXISTS negotiation_status;
DROP TYPE IF EXISTS bid_status;
DROP TYPE IF EXISTS rfq_status;
";
