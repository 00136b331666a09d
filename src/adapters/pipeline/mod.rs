pub mod capture_loop;
