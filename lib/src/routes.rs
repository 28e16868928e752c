pub const SIGN_UP: &str = "/api/auth/signup";
pub const LOGIN: &str = "/api/auth/login";
pub const LOGOUT: &str = "/api/auth/logout";

pub const CHECKOUT: &str = "/api/checkout";
pub const CHECKOUT_SESSION: &str = "/api/checkout/session";
pub const STRIPE_WEBHOOK: &str = "/api/webhooks/stripe";

pub const DOWNLOAD: &str = "/api/downloads/:product";
pub const FREEBIE: &str = "/api/freebie";
pub const FREEBIE_DOWNLOAD: &str = "/api/freebie/download";
pub const UNSUBSCRIBE: &str = "/api/unsubscribe";

pub const COLLECTIVE_APPLY: &str = "/api/collective/apply";
pub const COLLECTIVE_APPLICATION_STATUS: &str = "/api/collective/application-status";
pub const COLLECTIVE_PORTAL_CONTENT: &str = "/api/collective/portal-content";

pub const ADMIN_STATS: &str = "/api/admin/stats";
pub const ADMIN_ANALYTICS: &str = "/api/admin/analytics";
pub const ADMIN_ORDERS: &str = "/api/admin/orders";
pub const ADMIN_USERS: &str = "/api/admin/users";
pub const ADMIN_USER: &str = "/api/admin/users/:id";
pub const ADMIN_APPLICATIONS: &str = "/api/admin/collective/applications";
pub const ADMIN_APPLICATION_APPROVE: &str = "/api/admin/collective/applications/:id/approve";
pub const ADMIN_APPLICATION_DENY: &str = "/api/admin/collective/applications/:id/deny";
pub const ADMIN_MEMBERS: &str = "/api/admin/collective/members";
pub const ADMIN_MEMBER_TOGGLE_ACCESS: &str = "/api/admin/collective/members/:id/toggle-access";
pub const ADMIN_PORTAL_CONTENT: &str = "/api/admin/content/portal";
pub const ADMIN_UPLOAD_PDF: &str = "/api/admin/content/upload-pdf";
pub const ADMIN_EMAILS: &str = "/api/admin/emails";
pub const ADMIN_EMAIL_EXPORT: &str = "/api/admin/emails/export";
