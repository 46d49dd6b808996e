pub mod cpu_compute;
